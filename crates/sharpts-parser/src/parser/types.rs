//! Type-annotation parsing: unions, intersections, generics, conditional
//! and mapped types, template-literal types, index/call/construct
//! signatures.

use super::Parser;
use crate::ast::*;
use sharpts_common::Atom;
use sharpts_lexer::{Keyword, TokenKind};

impl<'src> Parser<'src> {
    pub(crate) fn parse_type(&mut self) -> TypeNode {
        self.parse_function_or_conditional_type()
    }

    fn parse_function_or_conditional_type(&mut self) -> TypeNode {
        if self.looks_like_function_type() {
            return self.parse_function_type();
        }
        let checked = self.parse_union_type();
        if self.matches_keyword(Keyword::Extends) {
            let extends = self.parse_union_type();
            self.expect(TokenKind::Question, "expected '?' in conditional type");
            let true_branch = self.parse_type();
            self.expect(TokenKind::Colon, "expected ':' in conditional type");
            let false_branch = self.parse_type();
            let span = checked.span.merge(false_branch.span);
            return TypeNode {
                span,
                kind: TypeNodeKind::Conditional {
                    check: Box::new(checked),
                    extends: Box::new(extends),
                    true_branch: Box::new(true_branch),
                    false_branch: Box::new(false_branch),
                },
            };
        }
        checked
    }

    fn looks_like_function_type(&mut self) -> bool {
        if self.check(TokenKind::LessThan) {
            return true;
        }
        if !self.check(TokenKind::OpenParen) {
            return false;
        }
        self.try_parse(|p| {
            p.expect(TokenKind::OpenParen, "")?;
            let mut depth = 1i32;
            while depth > 0 {
                if p.is_at_end() {
                    return None;
                }
                match p.peek().kind {
                    TokenKind::OpenParen => depth += 1,
                    TokenKind::CloseParen => depth -= 1,
                    _ => {}
                }
                p.advance();
            }
            if p.check(TokenKind::EqualsGreaterThan) {
                Some(())
            } else {
                None
            }
        })
        .is_some()
    }

    fn parse_function_type(&mut self) -> TypeNode {
        let start = self.peek().span;
        let type_params = self.parse_optional_type_params();
        self.expect(TokenKind::OpenParen, "expected '(' in function type");
        let mut this_param = None;
        let mut params = Vec::new();
        while !self.check(TokenKind::CloseParen) && !self.is_at_end() {
            if params.is_empty() && self.check_identifier_like() && self.peek().lexeme.as_str().as_ref() == "this" {
                self.advance();
                self.expect(TokenKind::Colon, "expected ':' for this parameter");
                this_param = Some(Box::new(self.parse_type()));
            } else {
                params.push(self.parse_param());
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')' to close function type");
        self.expect(TokenKind::EqualsGreaterThan, "expected '=>' in function type");
        let return_type = self.parse_type();
        let span = start.merge(return_type.span);
        TypeNode {
            span,
            kind: TypeNodeKind::Function {
                type_params,
                params,
                this_param,
                return_type: Box::new(return_type),
            },
        }
    }

    fn parse_union_type(&mut self) -> TypeNode {
        self.matches(TokenKind::Bar);
        let mut members = vec![self.parse_intersection_type()];
        while self.matches(TokenKind::Bar) {
            members.push(self.parse_intersection_type());
        }
        if members.len() == 1 {
            members.pop().unwrap()
        } else {
            let span = members[0].span.merge(members[members.len() - 1].span);
            TypeNode {
                span,
                kind: TypeNodeKind::Union(members),
            }
        }
    }

    fn parse_intersection_type(&mut self) -> TypeNode {
        self.matches(TokenKind::Ampersand);
        let mut members = vec![self.parse_postfix_type()];
        while self.matches(TokenKind::Ampersand) {
            members.push(self.parse_postfix_type());
        }
        if members.len() == 1 {
            members.pop().unwrap()
        } else {
            let span = members[0].span.merge(members[members.len() - 1].span);
            TypeNode {
                span,
                kind: TypeNodeKind::Intersection(members),
            }
        }
    }

    fn parse_postfix_type(&mut self) -> TypeNode {
        let mut ty = self.parse_primary_type();
        loop {
            if self.check(TokenKind::OpenBracket) {
                let save = self.pos;
                self.advance();
                if self.matches(TokenKind::CloseBracket) {
                    let span = ty.span.merge(self.previous().span);
                    ty = TypeNode {
                        span,
                        kind: TypeNodeKind::Array(Box::new(ty)),
                    };
                    continue;
                }
                self.pos = save;
            }
            break;
        }
        ty
    }

    fn parse_primary_type(&mut self) -> TypeNode {
        let start = self.peek().span;
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Keyof) => {
                self.advance();
                let inner = self.parse_postfix_type();
                TypeNode {
                    span: start.merge(inner.span),
                    kind: TypeNodeKind::Keyof(Box::new(inner)),
                }
            }
            TokenKind::Keyword(Keyword::TypeOf) => {
                self.advance();
                let mut path = vec![self.expect_identifier("after 'typeof'").name];
                while self.matches(TokenKind::Dot) {
                    path.push(self.expect_identifier("in typeof path").name);
                }
                TypeNode {
                    span: start.merge(self.previous().span),
                    kind: TypeNodeKind::Typeof(path),
                }
            }
            TokenKind::Keyword(Keyword::Infer) => {
                self.advance();
                let name = self.expect_identifier("after 'infer'").name;
                TypeNode {
                    span: start.merge(self.previous().span),
                    kind: TypeNodeKind::Infer(name),
                }
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                TypeNode {
                    span: start,
                    kind: TypeNodeKind::ThisType,
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_type();
                self.expect(TokenKind::CloseParen, "expected ')' to close parenthesized type");
                TypeNode {
                    span: start.merge(self.previous().span),
                    kind: TypeNodeKind::Paren(Box::new(inner)),
                }
            }
            TokenKind::OpenBracket => self.parse_tuple_type(),
            TokenKind::OpenBrace => self.parse_object_or_mapped_type(),
            TokenKind::DotDotDot => {
                self.advance();
                let inner = self.parse_type();
                TypeNode {
                    span: start.merge(inner.span),
                    kind: TypeNodeKind::Rest(Box::new(inner)),
                }
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                let text = match tok.literal {
                    Some(sharpts_lexer::LiteralValue::Str(s)) => s,
                    _ => String::new(),
                };
                TypeNode {
                    span: tok.span,
                    kind: TypeNodeKind::Literal(Literal::Str(text)),
                }
            }
            TokenKind::NumericLiteral => {
                let tok = self.advance();
                let value = match tok.literal {
                    Some(sharpts_lexer::LiteralValue::Number(n)) => n,
                    _ => 0.0,
                };
                TypeNode {
                    span: tok.span,
                    kind: TypeNodeKind::Literal(Literal::Number(value)),
                }
            }
            TokenKind::TemplateHead | TokenKind::NoSubstitutionTemplateLiteral => {
                self.parse_template_literal_type()
            }
            _ => self.parse_named_or_predicate_type(),
        }
    }

    fn parse_named_or_predicate_type(&mut self) -> TypeNode {
        let start = self.peek().span;
        let is_asserts = self.matches_keyword(Keyword::Asserts);
        if self.check_identifier_like() {
            // `x is T` / `asserts x is T` / `asserts x`
            if self.looks_like_type_predicate() {
                let param = self.expect_identifier("in type predicate").name;
                if is_asserts && !self.check_keyword(Keyword::Is) {
                    return TypeNode {
                        span: start.merge(self.previous().span),
                        kind: TypeNodeKind::TypePredicate {
                            parameter_name: param,
                            narrowed_type: None,
                            is_assertion: true,
                        },
                    };
                }
                self.matches_keyword(Keyword::Is);
                let narrowed = self.parse_type();
                return TypeNode {
                    span: start.merge(narrowed.span),
                    kind: TypeNodeKind::TypePredicate {
                        parameter_name: param,
                        narrowed_type: Some(Box::new(narrowed)),
                        is_assertion: is_asserts,
                    },
                };
            }
        }
        let name_tok = self.expect_identifier("in type");
        let mut type_args = Vec::new();
        if self.check(TokenKind::LessThan) {
            self.advance();
            if !self.check(TokenKind::GreaterThan) {
                loop {
                    type_args.push(self.parse_type());
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect_generic_close();
        }
        TypeNode {
            span: start.merge(self.previous().span),
            kind: TypeNodeKind::Named {
                name: name_tok.name,
                type_args,
            },
        }
    }

    fn looks_like_type_predicate(&mut self) -> bool {
        self.try_parse(|p| {
            let _ = p.expect_identifier("");
            if p.matches_keyword(Keyword::Is) {
                Some(())
            } else {
                None
            }
        })
        .is_some()
    }

    fn parse_tuple_type(&mut self) -> TypeNode {
        let start = self.peek().span;
        self.advance(); // '['
        let mut elements = Vec::new();
        while !self.check(TokenKind::CloseBracket) && !self.is_at_end() {
            let rest = self.matches(TokenKind::DotDotDot);
            let label = if self.check_identifier_like() && matches!(self.peek_at(1).kind, TokenKind::Colon | TokenKind::Question) {
                let name = self.expect_identifier("tuple label").name;
                Some(name)
            } else {
                None
            };
            let optional = label.is_some() && self.matches(TokenKind::Question);
            if label.is_some() {
                self.expect(TokenKind::Colon, "expected ':' after tuple label");
            }
            let ty = self.parse_type();
            let optional = optional || self.matches(TokenKind::Question);
            let kind = if rest {
                TupleElementKind::Rest
            } else if optional {
                TupleElementKind::Optional
            } else {
                TupleElementKind::Required
            };
            elements.push(TupleElement { ty, label, kind });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBracket, "expected ']' to close tuple type");
        TypeNode {
            span: start.merge(self.previous().span),
            kind: TypeNodeKind::Tuple(elements),
        }
    }

    fn parse_object_or_mapped_type(&mut self) -> TypeNode {
        let start = self.peek().span;
        self.advance(); // '{'
        if self.looks_like_mapped_type() {
            return self.parse_mapped_type(start);
        }
        let mut members = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            members.push(self.parse_type_member());
            self.matches(TokenKind::Semicolon);
            self.matches(TokenKind::Comma);
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close object type");
        TypeNode {
            span: start.merge(self.previous().span),
            kind: TypeNodeKind::ObjectLiteralType(members),
        }
    }

    fn looks_like_mapped_type(&mut self) -> bool {
        self.try_parse(|p| {
            p.matches_keyword(Keyword::Readonly);
            p.matches(TokenKind::Plus);
            p.matches(TokenKind::Minus);
            p.expect(TokenKind::OpenBracket, "")?;
            let _ = p.expect_identifier("");
            if p.matches_keyword(Keyword::In) {
                Some(())
            } else {
                None
            }
        })
        .is_some()
    }

    fn parse_mapped_type(&mut self, start: sharpts_common::Span) -> TypeNode {
        let readonly = if self.matches(TokenKind::Plus) {
            self.matches_keyword(Keyword::Readonly);
            Some(MappedModifier::Add)
        } else if self.matches(TokenKind::Minus) {
            self.matches_keyword(Keyword::Readonly);
            Some(MappedModifier::Remove)
        } else if self.matches_keyword(Keyword::Readonly) {
            Some(MappedModifier::Add)
        } else {
            None
        };
        self.expect(TokenKind::OpenBracket, "expected '[' in mapped type");
        let key_name = self.expect_identifier("mapped type key").name;
        self.expect_keyword_in();
        let constraint = self.parse_type();
        let name_type = if self.matches_keyword(Keyword::As) {
            Some(Box::new(self.parse_type()))
        } else {
            None
        };
        self.expect(TokenKind::CloseBracket, "expected ']' in mapped type");
        let optional = if self.matches(TokenKind::Plus) {
            self.expect(TokenKind::Question, "");
            Some(MappedModifier::Add)
        } else if self.matches(TokenKind::Minus) {
            self.expect(TokenKind::Question, "");
            Some(MappedModifier::Remove)
        } else if self.matches(TokenKind::Question) {
            Some(MappedModifier::Add)
        } else {
            None
        };
        self.expect(TokenKind::Colon, "expected ':' in mapped type");
        let value = self.parse_type();
        self.matches(TokenKind::Semicolon);
        self.expect(TokenKind::CloseBrace, "expected '}' to close mapped type");
        TypeNode {
            span: start.merge(self.previous().span),
            kind: TypeNodeKind::Mapped {
                key_name,
                constraint: Box::new(constraint),
                name_type,
                value: Box::new(value),
                readonly,
                optional,
            },
        }
    }

    fn expect_keyword_in(&mut self) {
        if !self.matches_keyword(Keyword::In) {
            let span = self.peek().span;
            self.error(span, "expected 'in' in mapped type");
        }
    }

    pub(crate) fn parse_type_member_pub(&mut self) -> TypeMember {
        self.parse_type_member()
    }

    fn parse_type_member(&mut self) -> TypeMember {
        let readonly = self.matches_keyword(Keyword::Readonly);
        if self.check(TokenKind::OpenParen) || self.check(TokenKind::LessThan) {
            let type_params = self.parse_optional_type_params();
            self.expect(TokenKind::OpenParen, "expected '(' in call signature");
            let params = self.parse_param_list();
            self.expect(TokenKind::CloseParen, "expected ')' in call signature");
            self.expect(TokenKind::Colon, "expected ':' for call signature return type");
            let return_type = self.parse_type();
            return TypeMember::Call {
                type_params,
                params,
                return_type,
            };
        }
        if self.matches_keyword(Keyword::New) {
            let type_params = self.parse_optional_type_params();
            self.expect(TokenKind::OpenParen, "expected '(' in construct signature");
            let params = self.parse_param_list();
            self.expect(TokenKind::CloseParen, "expected ')' in construct signature");
            self.expect(TokenKind::Colon, "expected ':' for construct signature return type");
            let return_type = self.parse_type();
            return TypeMember::Construct {
                type_params,
                params,
                return_type,
            };
        }
        if self.check(TokenKind::OpenBracket)
            && matches!(self.peek_at(2).kind, TokenKind::Colon)
        {
            self.advance();
            let key_name = self.expect_identifier("index signature key").name;
            self.expect(TokenKind::Colon, "expected ':' in index signature");
            let key_type = self.parse_type();
            self.expect(TokenKind::CloseBracket, "expected ']' to close index signature");
            self.expect(TokenKind::Colon, "expected ':' in index signature");
            let value = self.parse_type();
            return TypeMember::Index {
                key_name,
                key_type,
                value,
                readonly,
            };
        }
        let name = self.expect_identifier("in type member").name;
        let optional = self.matches(TokenKind::Question);
        if self.check(TokenKind::OpenParen) || self.check(TokenKind::LessThan) {
            let type_params = self.parse_optional_type_params();
            self.expect(TokenKind::OpenParen, "expected '(' in method signature");
            let params = self.parse_param_list();
            self.expect(TokenKind::CloseParen, "expected ')' in method signature");
            self.expect(TokenKind::Colon, "expected ':' for method return type");
            let return_type = self.parse_type();
            return TypeMember::Method {
                name,
                type_params,
                params,
                return_type,
                optional,
            };
        }
        self.expect(TokenKind::Colon, "expected ':' in property signature");
        let ty = self.parse_type();
        TypeMember::Property {
            name,
            ty,
            optional,
            readonly,
        }
    }

    fn parse_template_literal_type(&mut self) -> TypeNode {
        let start = self.peek().span;
        let mut parts = Vec::new();
        let first = self.advance();
        let text = literal_text(&first);
        parts.push(TemplateLiteralTypePart::Text(text));
        if first.kind == TokenKind::NoSubstitutionTemplateLiteral {
            return TypeNode {
                span: start.merge(first.span),
                kind: TypeNodeKind::TemplateLiteral(parts),
            };
        }
        loop {
            parts.push(TemplateLiteralTypePart::Type(self.parse_type()));
            let tok = self.advance();
            let is_tail = tok.kind == TokenKind::TemplateTail;
            parts.push(TemplateLiteralTypePart::Text(literal_text(&tok)));
            if is_tail || self.is_at_end() {
                break;
            }
        }
        TypeNode {
            span: start.merge(self.previous().span),
            kind: TypeNodeKind::TemplateLiteral(parts),
        }
    }

    pub(crate) fn parse_optional_type_params(&mut self) -> Vec<TypeParam> {
        if !self.matches(TokenKind::LessThan) {
            return Vec::new();
        }
        let mut params = Vec::new();
        while !self.check(TokenKind::GreaterThan) && !self.is_at_end() {
            let is_const = self.matches_keyword(Keyword::Const);
            let name = self.expect_identifier("type parameter name").name;
            let constraint = if self.matches_keyword(Keyword::Extends) {
                Some(self.parse_type())
            } else {
                None
            };
            let default = if self.matches(TokenKind::Equals) {
                Some(self.parse_type())
            } else {
                None
            };
            params.push(TypeParam {
                name,
                constraint,
                default,
                is_const,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect_generic_close();
        params
    }

    /// A `>>`/`>>>` token closing a generic list is logically split — one
    /// `>` closes this list, the remainder is pushed back by narrowing the
    /// token in place (no re-lexing needed) to close enclosing lists.
    pub(crate) fn expect_generic_close(&mut self) -> bool {
        match self.peek().kind {
            TokenKind::GreaterThan => {
                self.advance();
                true
            }
            TokenKind::GreaterThanGreaterThan => {
                let tok = &mut self.tokens[self.pos];
                tok.kind = TokenKind::GreaterThan;
                tok.span.start += 1;
                true
            }
            TokenKind::GreaterThanGreaterThanGreaterThan => {
                let tok = &mut self.tokens[self.pos];
                tok.kind = TokenKind::GreaterThanGreaterThan;
                tok.span.start += 1;
                true
            }
            TokenKind::GreaterThanEquals => {
                let tok = &mut self.tokens[self.pos];
                tok.kind = TokenKind::Equals;
                tok.span.start += 1;
                true
            }
            _ => {
                let span = self.peek().span;
                self.error(span, "expected '>' to close type argument list");
                false
            }
        }
    }

    /// Attempt `f<A,B>(` as a call's explicit type-argument list. Reverts
    /// (treating `<` as less-than) unless the list parses to a matching
    /// `>` immediately followed by `(`.
    pub(crate) fn try_parse_call_type_args(&mut self) -> Option<Vec<TypeNode>> {
        self.try_parse(|p| {
            p.expect(TokenKind::LessThan, "")?;
            let mut args = Vec::new();
            if !p.check(TokenKind::GreaterThan) {
                loop {
                    args.push(p.parse_type());
                    if !p.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            if !p.expect_generic_close() {
                return None;
            }
            if p.check(TokenKind::OpenParen) {
                Some(args)
            } else {
                None
            }
        })
    }
}

impl<'src> Parser<'src> {
    pub(crate) fn parse_param_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        while !self.check(TokenKind::CloseParen) && !self.is_at_end() {
            params.push(self.parse_param());
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        params
    }

    pub(crate) fn parse_param(&mut self) -> Param {
        let mut decorators_consumed = Vec::new();
        while self.check(TokenKind::At) {
            decorators_consumed.push(self.parse_decorator());
        }
        let modifier = if self.matches_keyword(Keyword::Public) {
            ParamModifier::Public
        } else if self.matches_keyword(Keyword::Private) {
            ParamModifier::Private
        } else if self.matches_keyword(Keyword::Protected) {
            ParamModifier::Protected
        } else if self.matches_keyword(Keyword::Readonly) {
            ParamModifier::Readonly
        } else {
            ParamModifier::None
        };
        let rest = self.matches(TokenKind::DotDotDot);
        let pattern = self.parse_binding_pattern();
        let optional = self.matches(TokenKind::Question);
        let type_annotation = if self.matches(TokenKind::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        let default = if self.matches(TokenKind::Equals) {
            Some(self.parse_assignment_expr())
        } else {
            None
        };
        Param {
            pattern,
            type_annotation,
            default,
            optional,
            rest,
            modifier,
        }
    }

    pub(crate) fn parse_binding_pattern(&mut self) -> BindingPattern {
        match self.peek().kind {
            TokenKind::OpenBracket => self.parse_array_binding_pattern(),
            TokenKind::OpenBrace => self.parse_object_binding_pattern(),
            _ => BindingPattern::Identifier(self.expect_identifier("in binding pattern")),
        }
    }

    fn parse_array_binding_pattern(&mut self) -> BindingPattern {
        self.advance(); // '['
        let mut elements = Vec::new();
        while !self.check(TokenKind::CloseBracket) && !self.is_at_end() {
            if self.check(TokenKind::Comma) {
                elements.push(None);
                self.advance();
                continue;
            }
            let rest = self.matches(TokenKind::DotDotDot);
            let pattern = self.parse_binding_pattern();
            let default = if self.matches(TokenKind::Equals) {
                Some(self.parse_assignment_expr())
            } else {
                None
            };
            elements.push(Some(BindingElement {
                pattern,
                default,
                rest,
            }));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBracket, "expected ']' to close array binding pattern");
        BindingPattern::Array(elements)
    }

    fn parse_object_binding_pattern(&mut self) -> BindingPattern {
        self.advance(); // '{'
        let mut props = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            if self.matches(TokenKind::DotDotDot) {
                let name = self.expect_identifier("in rest binding");
                props.push(ObjectBindingProperty {
                    key: PropertyKey::Identifier(name.name.clone()),
                    value: BindingElement {
                        pattern: BindingPattern::Identifier(name),
                        default: None,
                        rest: true,
                    },
                });
                break;
            }
            let key = self.parse_binding_property_key();
            let pattern = if self.matches(TokenKind::Colon) {
                self.parse_binding_pattern()
            } else if let PropertyKey::Identifier(name) = &key {
                BindingPattern::Identifier(Ident {
                    name: name.clone(),
                    span: self.previous().span,
                })
            } else {
                let span = self.peek().span;
                self.error(span, "expected binding name");
                BindingPattern::Identifier(Ident {
                    name: Atom::new("<error>"),
                    span,
                })
            };
            let default = if self.matches(TokenKind::Equals) {
                Some(self.parse_assignment_expr())
            } else {
                None
            };
            props.push(ObjectBindingProperty {
                key,
                value: BindingElement {
                    pattern,
                    default,
                    rest: false,
                },
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close object binding pattern");
        BindingPattern::Object(props)
    }

    fn parse_binding_property_key(&mut self) -> PropertyKey {
        if self.check(TokenKind::OpenBracket) {
            self.advance();
            let expr = self.parse_assignment_expr();
            self.expect(TokenKind::CloseBracket, "expected ']' to close computed key");
            return PropertyKey::Computed(Box::new(expr));
        }
        if self.check(TokenKind::StringLiteral) {
            let tok = self.advance();
            return PropertyKey::StringLiteral(literal_text(&tok));
        }
        if self.check(TokenKind::NumericLiteral) {
            let tok = self.advance();
            let value = match tok.literal {
                Some(sharpts_lexer::LiteralValue::Number(n)) => n,
                _ => 0.0,
            };
            return PropertyKey::NumberLiteral(value);
        }
        PropertyKey::Identifier(self.expect_identifier("in binding property").name)
    }
}

fn literal_text(tok: &sharpts_lexer::Token) -> String {
    match &tok.literal {
        Some(sharpts_lexer::LiteralValue::Str(s)) => s.clone(),
        _ => String::new(),
    }
}
