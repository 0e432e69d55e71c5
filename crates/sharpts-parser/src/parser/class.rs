//! Class declaration/expression parsing: member
//! modifiers (accessibility, `static`/`abstract`/`override`/`readonly`),
//! decorators (Stage-2 and Stage-3 shapes), parameter properties, private
//! names (`#x`), accessors, `accessor` auto-accessors, and static
//! initializer blocks. Shared by `class Foo {}` declarations and `class {}`
//! expressions — both funnel through `parse_class_tail`.

use super::Parser;
use crate::ast::*;
use sharpts_lexer::{Keyword, TokenKind};

impl<'src> Parser<'src> {
    /// `class` has not been consumed yet; an optional leading `abstract`
    /// has not been consumed either — both are handled here so every call
    /// site (bare `class Foo {}`, `@dec class Foo {}`, `abstract class
    /// Foo {}`, and the `class {}` expression form) can dispatch uniformly.
    pub(crate) fn parse_class_tail(&mut self, decorators: Vec<Decorator>) -> ClassDecl {
        let is_abstract = self.matches_keyword(Keyword::Abstract);
        self.expect(TokenKind::Keyword(Keyword::Class), "expected 'class'");
        let name = if self.check_identifier_like() && !self.check_keyword(Keyword::Extends) && !self.check_keyword(Keyword::Implements) {
            Some(self.expect_identifier("class name"))
        } else {
            None
        };
        let type_params = self.parse_optional_type_params();
        let mut superclass = None;
        let mut superclass_type_args = Vec::new();
        if self.matches_keyword(Keyword::Extends) {
            superclass = Some(Box::new(self.parse_assignment_expr()));
            if let Some(args) = self.try_parse_call_type_args() {
                superclass_type_args = args;
            }
        }
        let mut implements = Vec::new();
        if self.matches_keyword(Keyword::Implements) {
            loop {
                let iface_name = self.expect_identifier("implemented interface name").name;
                let type_args = if self.matches(TokenKind::LessThan) {
                    self.parse_type_argument_list_tail()
                } else {
                    Vec::new()
                };
                implements.push(Implements {
                    name: iface_name,
                    type_args,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::OpenBrace, "expected '{' to open class body");
        let mut members = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            if self.matches(TokenKind::Semicolon) {
                continue;
            }
            members.push(self.parse_class_member());
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close class body");
        ClassDecl {
            name,
            type_params,
            superclass,
            superclass_type_args,
            implements,
            members,
            is_abstract,
            decorators,
        }
    }

    /// Consumes the remaining `A, B>` of a type-argument list after the
    /// opening `<` has already been matched (used by `implements I<T>`,
    /// which is unambiguous — no `<`-as-less-than fallback needed there).
    fn parse_type_argument_list_tail(&mut self) -> Vec<TypeNode> {
        let mut args = Vec::new();
        if !self.check(TokenKind::GreaterThan) {
            loop {
                args.push(self.parse_type());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_generic_close();
        args
    }

    fn parse_class_member(&mut self) -> ClassMember {
        let decorators = self.parse_leading_decorators();

        if self.check_keyword(Keyword::Static) && matches!(self.peek_at(1).kind, TokenKind::OpenBrace) {
            self.advance();
            let body = self.parse_block_statement();
            return ClassMember::StaticBlock(Box::new(body));
        }

        let accessibility = if self.matches_keyword(Keyword::Public) {
            Some(Accessibility::Public)
        } else if self.matches_keyword(Keyword::Private) {
            Some(Accessibility::Private)
        } else if self.matches_keyword(Keyword::Protected) {
            Some(Accessibility::Protected)
        } else {
            None
        };

        let mut modifiers = FunctionModifiers::default();
        loop {
            if self.check_keyword(Keyword::Static) && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon) {
                self.advance();
                modifiers.is_static = true;
            } else if self.check_keyword(Keyword::Abstract) && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon) {
                self.advance();
                modifiers.is_abstract = true;
            } else if self.check_keyword(Keyword::Override) && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon) {
                self.advance();
                modifiers.is_override = true;
            } else if self.check_keyword(Keyword::Readonly) && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon) {
                self.advance();
                modifiers.is_readonly = true;
            } else {
                break;
            }
        }

        // `accessor` auto-accessor field: `accessor x: T = v;`. The
        // `accessor` keyword is contextual — bail out if what follows
        // can't start a member name (then it was actually the field name).
        if self.check_keyword(Keyword::Accessor)
            && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon | TokenKind::Question)
        {
            self.advance();
            let name = self.parse_property_key();
            let optional = self.matches(TokenKind::Question);
            let _ = optional;
            let type_annotation = if self.matches(TokenKind::Colon) {
                Some(self.parse_type())
            } else {
                None
            };
            let initializer = if self.matches(TokenKind::Equals) {
                Some(self.parse_assignment_expr())
            } else {
                None
            };
            self.consume_member_terminator();
            return ClassMember::AutoAccessor(AutoAccessorDecl {
                name,
                type_annotation,
                initializer,
                modifiers,
                accessibility,
            });
        }

        let is_async = self.check_keyword(Keyword::Async)
            && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon | TokenKind::Question);
        if is_async {
            self.advance();
        }
        let is_generator = self.matches(TokenKind::Asterisk);
        modifiers.is_async = is_async;
        modifiers.is_generator = is_generator;

        // get/set accessors — contextual, same disambiguation as object
        // literals: only when followed by a member name, not `(`/`:`/`;`.
        if self.check_keyword(Keyword::Get)
            && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon)
        {
            self.advance();
            let name = self.parse_property_key();
            let function = self.parse_function_tail(modifiers.clone());
            let params = function.params;
            let return_type = function.return_type;
            let body = function.body.unwrap_or_else(|| {
                Box::new(Stmt {
                    span: sharpts_common::Span::synthetic(),
                    kind: StmtKind::Block(Vec::new()),
                })
            });
            return ClassMember::Accessor(AccessorDecl {
                kind: AccessorKind::Get,
                name,
                params,
                return_type,
                body,
                modifiers,
                accessibility,
            });
        }
        if self.check_keyword(Keyword::Set)
            && !matches!(self.peek_at(1).kind, TokenKind::OpenParen | TokenKind::Equals | TokenKind::Colon | TokenKind::Semicolon)
        {
            self.advance();
            let name = self.parse_property_key();
            let function = self.parse_function_tail(modifiers.clone());
            let params = function.params;
            let return_type = function.return_type;
            let body = function.body.unwrap_or_else(|| {
                Box::new(Stmt {
                    span: sharpts_common::Span::synthetic(),
                    kind: StmtKind::Block(Vec::new()),
                })
            });
            return ClassMember::Accessor(AccessorDecl {
                kind: AccessorKind::Set,
                name,
                params,
                return_type,
                body,
                modifiers,
                accessibility,
            });
        }

        // Constructor: the identifier `constructor` used as an ordinary
        // method name.
        if self.check_keyword(Keyword::Constructor) {
            self.advance();
            let function = self.parse_function_tail(modifiers);
            return ClassMember::Constructor(function);
        }

        let is_private_name = self.check(TokenKind::PrivateIdentifier);
        let name = if is_private_name {
            let tok = self.advance();
            PropertyKey::Identifier(tok.lexeme)
        } else {
            self.parse_property_key()
        };

        let optional = self.matches(TokenKind::Question);
        let definite_assignment = !optional && self.matches(TokenKind::Exclamation);

        if self.check(TokenKind::OpenParen) || self.check(TokenKind::LessThan) {
            let function = self.parse_function_tail(modifiers);
            let function = FunctionDecl {
                name: None,
                ..function
            };
            return ClassMember::Method(MethodDecl {
                name,
                is_private_name,
                function,
                accessibility,
                decorators,
            });
        }

        let type_annotation = if self.matches(TokenKind::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        let initializer = if self.matches(TokenKind::Equals) {
            Some(self.parse_assignment_expr())
        } else {
            None
        };
        self.consume_member_terminator();
        ClassMember::Field(FieldDecl {
            name,
            is_private_name,
            type_annotation,
            initializer,
            modifiers,
            accessibility,
            decorators,
            definite_assignment,
        })
    }

    fn consume_member_terminator(&mut self) {
        self.matches(TokenKind::Semicolon);
    }

    /// `@expr` — the decorated expression is parsed at assignment-expr
    /// level, a superset of the grammar's `LeftHandSideExpression` slot
    /// that still accepts every real decorator shape (`@sealed`,
    /// `@Component({...})`, `@ns.dec`).
    pub(crate) fn parse_decorator(&mut self) -> Decorator {
        self.expect(TokenKind::At, "expected '@' to start decorator");
        let expr = self.parse_unary_level_for_decorator();
        Decorator { expr }
    }

    /// Decorators bind tighter than a bare call to `parse_assignment_expr`
    /// would suggest is necessary, but reusing it keeps this file from
    /// needing a new precedence entry point — a decorator target is never
    /// followed by a binary/ternary operator in practice.
    fn parse_unary_level_for_decorator(&mut self) -> Expr {
        self.parse_assignment_expr()
    }
}
