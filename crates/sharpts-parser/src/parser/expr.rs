//! Expression parsing: the precedence ladder from assignment down to
//! primary expressions, plus the speculative disambiguations TypeScript's
//! grammar needs by name (arrow head vs. parenthesized expression,
//! explicit call type arguments, nested generic `>>`/`>>>` closes).

use super::Parser;
use crate::ast::*;
use sharpts_common::Span;
use sharpts_lexer::{Keyword, LiteralValue, TokenKind};

impl<'src> Parser<'src> {
    pub(crate) fn parse_expression(&mut self) -> Expr {
        let first = self.parse_assignment_expr();
        if !self.check(TokenKind::Comma) {
            return first;
        }
        let mut exprs = vec![first];
        while self.matches(TokenKind::Comma) {
            exprs.push(self.parse_assignment_expr());
        }
        let span = exprs[0].span.merge(exprs[exprs.len() - 1].span);
        exprs
            .into_iter()
            .reduce(|left, right| Expr {
                span,
                kind: ExprKind::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            })
            .unwrap()
    }

    /// Assignment is the lowest-precedence level that still parses as a
    /// single expression (no comma operator).
    pub(crate) fn parse_assignment_expr(&mut self) -> Expr {
        if let Some(arrow) = self.try_parse(|p| p.try_parse_arrow_function()) {
            return arrow;
        }
        if self.check_keyword(Keyword::Yield) {
            return self.parse_yield_expr();
        }
        let left = self.parse_conditional_expr();
        let op_span = self.peek().span;
        match self.peek().kind {
            TokenKind::Equals => {
                self.advance();
                let value = self.parse_assignment_expr();
                Expr {
                    span: left.span.merge(value.span),
                    kind: ExprKind::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                }
            }
            TokenKind::PlusEquals
            | TokenKind::MinusEquals
            | TokenKind::AsteriskEquals
            | TokenKind::SlashEquals
            | TokenKind::PercentEquals
            | TokenKind::AsteriskAsteriskEquals
            | TokenKind::LessThanLessThanEquals
            | TokenKind::GreaterThanGreaterThanEquals
            | TokenKind::GreaterThanGreaterThanGreaterThanEquals
            | TokenKind::AmpersandEquals
            | TokenKind::BarEquals
            | TokenKind::CaretEquals => {
                let op = compound_assign_op(self.peek().kind);
                self.advance();
                let value = self.parse_assignment_expr();
                Expr {
                    span: left.span.merge(value.span),
                    kind: ExprKind::CompoundAssign {
                        op,
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                }
            }
            TokenKind::AmpersandAmpersandEquals | TokenKind::BarBarEquals | TokenKind::QuestionQuestionEquals => {
                let (op, narrow_undefined_only) = match self.peek().kind {
                    TokenKind::AmpersandAmpersandEquals => (LogicalOp::And, false),
                    TokenKind::BarBarEquals => (LogicalOp::Or, false),
                    _ => (LogicalOp::Or, true),
                };
                self.advance();
                let value = self.parse_assignment_expr();
                Expr {
                    span: left.span.merge(value.span),
                    kind: ExprKind::LogicalAssign {
                        op,
                        narrow_undefined_only,
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                }
            }
            _ => {
                let _ = op_span;
                left
            }
        }
    }

    fn parse_yield_expr(&mut self) -> Expr {
        let start = self.peek().span;
        self.advance();
        let delegate = self.matches(TokenKind::Asterisk);
        let value = if self.can_start_expression() {
            Some(Box::new(self.parse_assignment_expr()))
        } else {
            None
        };
        let span = match &value {
            Some(v) => start.merge(v.span),
            None => start,
        };
        Expr {
            span,
            kind: ExprKind::Yield { value, delegate },
        }
    }

    fn can_start_expression(&self) -> bool {
        !matches!(
            self.peek().kind,
            TokenKind::Semicolon
                | TokenKind::CloseParen
                | TokenKind::CloseBrace
                | TokenKind::CloseBracket
                | TokenKind::Comma
                | TokenKind::Eof
        ) && !self.peek().preceded_by_newline
    }

    fn parse_conditional_expr(&mut self) -> Expr {
        let condition = self.parse_nullish_coalescing_expr();
        if self.matches(TokenKind::Question) {
            let then_branch = self.parse_assignment_expr();
            self.expect(TokenKind::Colon, "expected ':' in conditional expression");
            let else_branch = self.parse_assignment_expr();
            Expr {
                span: condition.span.merge(else_branch.span),
                kind: ExprKind::Ternary {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
            }
        } else {
            condition
        }
    }

    fn parse_nullish_coalescing_expr(&mut self) -> Expr {
        let mut left = self.parse_logical_or_expr();
        while self.matches(TokenKind::QuestionQuestion) {
            let right = self.parse_logical_or_expr();
            left = Expr {
                span: left.span.merge(right.span),
                kind: ExprKind::NullishCoalescing {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        left
    }

    fn parse_logical_or_expr(&mut self) -> Expr {
        let mut left = self.parse_logical_and_expr();
        while self.matches(TokenKind::BarBar) {
            let right = self.parse_logical_and_expr();
            left = Expr {
                span: left.span.merge(right.span),
                kind: ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        left
    }

    fn parse_logical_and_expr(&mut self) -> Expr {
        let mut left = self.parse_bitwise_or_expr();
        while self.matches(TokenKind::AmpersandAmpersand) {
            let right = self.parse_bitwise_or_expr();
            left = Expr {
                span: left.span.merge(right.span),
                kind: ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        left
    }

    fn parse_bitwise_or_expr(&mut self) -> Expr {
        let mut left = self.parse_bitwise_xor_expr();
        while self.check(TokenKind::Bar) {
            self.advance();
            let right = self.parse_bitwise_xor_expr();
            left = binary(BinaryOp::BitOr, left, right);
        }
        left
    }

    fn parse_bitwise_xor_expr(&mut self) -> Expr {
        let mut left = self.parse_bitwise_and_expr();
        while self.matches(TokenKind::Caret) {
            let right = self.parse_bitwise_and_expr();
            left = binary(BinaryOp::BitXor, left, right);
        }
        left
    }

    fn parse_bitwise_and_expr(&mut self) -> Expr {
        let mut left = self.parse_equality_expr();
        while self.check(TokenKind::Ampersand) {
            self.advance();
            let right = self.parse_equality_expr();
            left = binary(BinaryOp::BitAnd, left, right);
        }
        left
    }

    fn parse_equality_expr(&mut self) -> Expr {
        let mut left = self.parse_relational_expr();
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualsEquals => BinaryOp::Eq,
                TokenKind::ExclamationEquals => BinaryOp::NotEq,
                TokenKind::EqualsEqualsEquals => BinaryOp::StrictEq,
                TokenKind::ExclamationEqualsEquals => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational_expr();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_relational_expr(&mut self) -> Expr {
        let mut left = self.parse_shift_expr();
        loop {
            let op = match self.peek().kind {
                TokenKind::LessThan => BinaryOp::Lt,
                TokenKind::LessThanEquals => BinaryOp::LtEq,
                TokenKind::GreaterThan => BinaryOp::Gt,
                TokenKind::GreaterThanEquals => BinaryOp::GtEq,
                TokenKind::Keyword(Keyword::InstanceOf) => BinaryOp::InstanceOf,
                TokenKind::Keyword(Keyword::In) => BinaryOp::In,
                _ => break,
            };
            self.advance();
            let right = self.parse_shift_expr();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_shift_expr(&mut self) -> Expr {
        let mut left = self.parse_additive_expr();
        loop {
            let op = match self.peek().kind {
                TokenKind::LessThanLessThan => BinaryOp::Shl,
                TokenKind::GreaterThanGreaterThan => BinaryOp::Shr,
                TokenKind::GreaterThanGreaterThanGreaterThan => BinaryOp::UShr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive_expr();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_additive_expr(&mut self) -> Expr {
        let mut left = self.parse_multiplicative_expr();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expr();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_multiplicative_expr(&mut self) -> Expr {
        let mut left = self.parse_exponent_expr();
        loop {
            let op = match self.peek().kind {
                TokenKind::Asterisk => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_exponent_expr();
            left = binary(op, left, right);
        }
        left
    }

    /// Right-associative.
    fn parse_exponent_expr(&mut self) -> Expr {
        let left = self.parse_unary_expr();
        if self.matches(TokenKind::AsteriskAsterisk) {
            let right = self.parse_exponent_expr();
            binary(BinaryOp::Pow, left, right)
        } else {
            left
        }
    }

    fn parse_unary_expr(&mut self) -> Expr {
        let start = self.peek().span;
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Exclamation => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Keyword(Keyword::TypeOf) => Some(UnaryOp::TypeOf),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary_expr();
            return Expr {
                span: start.merge(operand.span),
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            };
        }
        if self.check_keyword(Keyword::Delete) {
            self.advance();
            let operand = self.parse_unary_expr();
            return Expr {
                span: start.merge(operand.span),
                kind: ExprKind::Delete(Box::new(operand)),
            };
        }
        if self.check_keyword(Keyword::Await) {
            self.advance();
            let operand = self.parse_unary_expr();
            return Expr {
                span: start.merge(operand.span),
                kind: ExprKind::Await(Box::new(operand)),
            };
        }
        if matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if self.peek().kind == TokenKind::PlusPlus {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            let operand = self.parse_unary_expr();
            return Expr {
                span: start.merge(operand.span),
                kind: ExprKind::PrefixUpdate {
                    op,
                    operand: Box::new(operand),
                },
            };
        }
        if self.check(TokenKind::LessThan) {
            // Legacy angle-bracket type assertion: `<T>expr`. Only valid
            // outside JSX-aware parsing; this core has no JSX module, so
            // this form is always available.
            if let Some(expr) = self.try_parse(|p| p.try_parse_angle_type_assertion()) {
                return expr;
            }
        }
        self.parse_postfix_expr()
    }

    fn try_parse_angle_type_assertion(&mut self) -> Option<Expr> {
        let start = self.peek().span;
        self.advance();
        let ty = self.parse_type();
        if !self.expect_generic_close() {
            return None;
        }
        let operand = self.parse_unary_expr();
        Some(Expr {
            span: start.merge(operand.span),
            kind: ExprKind::TypeAssertion {
                expr: Box::new(operand),
                ty,
            },
        })
    }

    fn parse_postfix_expr(&mut self) -> Expr {
        let mut expr = self.parse_call_or_member_expr();
        if !self.peek().preceded_by_newline
            && matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus)
        {
            let op = if self.peek().kind == TokenKind::PlusPlus {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            let tok = self.advance();
            expr = Expr {
                span: expr.span.merge(tok.span),
                kind: ExprKind::PostfixUpdate {
                    op,
                    operand: Box::new(expr),
                },
            };
        }
        if self.matches_keyword(Keyword::As) {
            if self.matches_keyword(Keyword::Const) {
                return expr;
            }
            let ty = self.parse_type();
            expr = Expr {
                span: expr.span.merge(ty.span),
                kind: ExprKind::TypeAssertion {
                    expr: Box::new(expr),
                    ty,
                },
            };
        } else if self.matches_keyword(Keyword::Satisfies) {
            let ty = self.parse_type();
            expr = Expr {
                span: expr.span.merge(ty.span),
                kind: ExprKind::Satisfies {
                    expr: Box::new(expr),
                    ty,
                },
            };
        }
        expr
    }

    fn parse_call_or_member_expr(&mut self) -> Expr {
        let mut expr = if self.check_keyword(Keyword::New) {
            self.parse_new_expr()
        } else {
            self.parse_primary_expr()
        };
        loop {
            expr = match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    self.parse_member_or_call_private(expr, false)
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    if self.check(TokenKind::OpenBracket) {
                        self.advance();
                        let index = self.parse_expression();
                        self.expect(TokenKind::CloseBracket, "expected ']'");
                        Expr {
                            span: expr.span.merge(self.previous().span),
                            kind: ExprKind::GetIndex {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                            },
                        }
                    } else if self.check(TokenKind::OpenParen) {
                        self.parse_call_tail(expr, true, None)
                    } else {
                        self.parse_member_or_call_private(expr, true)
                    }
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    self.expect(TokenKind::CloseBracket, "expected ']' to close index expression");
                    Expr {
                        span: expr.span.merge(self.previous().span),
                        kind: ExprKind::GetIndex {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: false,
                        },
                    }
                }
                TokenKind::OpenParen => self.parse_call_tail(expr, false, None),
                TokenKind::NoSubstitutionTemplateLiteral | TokenKind::TemplateHead => {
                    let template = self.parse_template_literal();
                    self.tagged_template(expr, template)
                }
                TokenKind::LessThan => {
                    if let Some(type_args) = self.try_parse_call_type_args() {
                        self.parse_call_tail(expr, false, Some(type_args))
                    } else {
                        break;
                    }
                }
                TokenKind::Exclamation if !self.peek().preceded_by_newline => {
                    let tok = self.advance();
                    Expr {
                        span: expr.span.merge(tok.span),
                        kind: ExprKind::NonNullAssertion(Box::new(expr)),
                    }
                }
                _ => break,
            };
        }
        expr
    }

    fn parse_member_or_call_private(&mut self, object: Expr, optional: bool) -> Expr {
        if self.check(TokenKind::PrivateIdentifier) {
            let tok = self.advance();
            if self.check(TokenKind::OpenParen) {
                let args = self.parse_call_arguments();
                return Expr {
                    span: object.span.merge(self.previous().span),
                    kind: ExprKind::CallPrivate {
                        object: Box::new(object),
                        name: tok.lexeme,
                        args,
                    },
                };
            }
            return Expr {
                span: object.span.merge(tok.span),
                kind: ExprKind::GetPrivate {
                    object: Box::new(object),
                    name: tok.lexeme,
                },
            };
        }
        let name_tok = self.expect_identifier("after '.'");
        Expr {
            span: object.span.merge(name_tok.span),
            kind: ExprKind::Get {
                object: Box::new(object),
                name: name_tok.name,
                optional,
            },
        }
    }

    fn parse_call_tail(&mut self, callee: Expr, optional: bool, type_args: Option<Vec<TypeNode>>) -> Expr {
        let args = self.parse_call_arguments();
        Expr {
            span: callee.span.merge(self.previous().span),
            kind: ExprKind::Call {
                callee: Box::new(callee),
                type_args,
                args,
                optional,
            },
        }
    }

    fn parse_call_arguments(&mut self) -> Vec<Expr> {
        self.expect(TokenKind::OpenParen, "expected '(' for call arguments");
        let mut args = Vec::new();
        while !self.check(TokenKind::CloseParen) && !self.is_at_end() {
            if self.matches(TokenKind::DotDotDot) {
                let inner = self.parse_assignment_expr();
                args.push(Expr {
                    span: inner.span,
                    kind: ExprKind::Spread(Box::new(inner)),
                });
            } else {
                args.push(self.parse_assignment_expr());
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')' to close call arguments");
        args
    }

    fn parse_new_expr(&mut self) -> Expr {
        let start = self.peek().span;
        self.advance(); // 'new'
        if self.matches(TokenKind::Dot) {
            self.expect_identifier("expected 'target' after 'new.'");
            return Expr {
                span: start.merge(self.previous().span),
                kind: ExprKind::ImportMeta,
            };
        }
        let callee = if self.check_keyword(Keyword::New) {
            self.parse_new_expr()
        } else {
            self.parse_member_expr_no_call()
        };
        let type_args = self.try_parse_call_type_args();
        let args = if self.check(TokenKind::OpenParen) {
            self.parse_call_arguments()
        } else {
            Vec::new()
        };
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::New {
                callee: Box::new(callee),
                type_args,
                args,
            },
        }
    }

    /// Member-access chain without call parens, used for `new` callee
    /// resolution (`new a.b.C()` binds `C` as the constructor, not `a.b`
    /// called then `new`ed).
    fn parse_member_expr_no_call(&mut self) -> Expr {
        let mut expr = self.parse_primary_expr();
        loop {
            expr = match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    self.parse_member_or_call_private(expr, false)
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    self.expect(TokenKind::CloseBracket, "expected ']'");
                    Expr {
                        span: expr.span.merge(self.previous().span),
                        kind: ExprKind::GetIndex {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: false,
                        },
                    }
                }
                _ => break,
            };
        }
        expr
    }

    fn tagged_template(&mut self, tag: Expr, template: Expr) -> Expr {
        if let ExprKind::TemplateLiteral { quasis, exprs } = template.kind {
            Expr {
                span: tag.span.merge(template.span),
                kind: ExprKind::TaggedTemplateLiteral {
                    tag: Box::new(tag),
                    cooked: quasis.iter().cloned().map(Some).collect(),
                    raw: quasis,
                    exprs,
                },
            }
        } else {
            tag
        }
    }

    fn parse_primary_expr(&mut self) -> Expr {
        let start = self.peek().span;
        match self.peek().kind {
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::This,
                }
            }
            TokenKind::Keyword(Keyword::Super) => {
                self.advance();
                let kind = if self.check(TokenKind::OpenParen) {
                    SuperKind::ConstructorTarget
                } else {
                    SuperKind::MethodBound
                };
                Expr {
                    span: start,
                    kind: ExprKind::Super(kind),
                }
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Null),
                }
            }
            TokenKind::Keyword(Keyword::Undefined) => {
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Undefined),
                }
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Bool(true)),
                }
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Expr {
                    span: start,
                    kind: ExprKind::Literal(Literal::Bool(false)),
                }
            }
            TokenKind::NumericLiteral => {
                let tok = self.advance();
                let value = match tok.literal {
                    Some(LiteralValue::Number(n)) => n,
                    _ => 0.0,
                };
                Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::Number(value)),
                }
            }
            TokenKind::BigIntLiteral => {
                let tok = self.advance();
                let digits = match tok.literal {
                    Some(LiteralValue::BigInt(s)) => s,
                    _ => String::new(),
                };
                Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::BigInt(digits)),
                }
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                let text = match tok.literal {
                    Some(LiteralValue::Str(s)) => s,
                    _ => String::new(),
                };
                Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::Str(text)),
                }
            }
            TokenKind::RegularExpressionLiteral => {
                let tok = self.advance();
                let (pattern, flags) = match tok.literal {
                    Some(LiteralValue::Regex { pattern, flags }) => (pattern, flags),
                    _ => (String::new(), String::new()),
                };
                Expr {
                    span: tok.span,
                    kind: ExprKind::Regex { pattern, flags },
                }
            }
            TokenKind::NoSubstitutionTemplateLiteral | TokenKind::TemplateHead => self.parse_template_literal(),
            TokenKind::Identifier | TokenKind::Keyword(_) if self.check_identifier_like() => {
                self.parse_identifier_or_async_function()
            }
            TokenKind::PrivateIdentifier => {
                // `#x in obj` ergonomic brand check — evaluated as a plain
                // variable reference here; the `in` operator gives it
                // meaning at the binary-expression level.
                let tok = self.advance();
                Expr {
                    span: tok.span,
                    kind: ExprKind::Variable(Ident {
                        name: tok.lexeme,
                        span: tok.span,
                    }),
                }
            }
            TokenKind::OpenParen => self.parse_parenthesized_expr(),
            TokenKind::OpenBracket => self.parse_array_literal(),
            TokenKind::OpenBrace => self.parse_object_literal(),
            TokenKind::Keyword(Keyword::Function) => self.parse_function_expr(),
            TokenKind::Keyword(Keyword::Class) => self.parse_class_expr(),
            TokenKind::Keyword(Keyword::Import) => {
                self.advance();
                if self.matches(TokenKind::Dot) {
                    self.expect_identifier("expected 'meta' after 'import.'");
                    return Expr {
                        span: start.merge(self.previous().span),
                        kind: ExprKind::ImportMeta,
                    };
                }
                self.expect(TokenKind::OpenParen, "expected '(' in dynamic import");
                let spec = self.parse_assignment_expr();
                self.expect(TokenKind::CloseParen, "expected ')' to close dynamic import");
                Expr {
                    span: start.merge(self.previous().span),
                    kind: ExprKind::DynamicImport(Box::new(spec)),
                }
            }
            _ => {
                let tok = self.advance();
                self.error(tok.span, "expected expression");
                Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::Undefined),
                }
            }
        }
    }

    fn parse_identifier_or_async_function(&mut self) -> Expr {
        if self.check_keyword(Keyword::Async) && !self.peek_at(1).preceded_by_newline {
            if matches!(self.peek_at(1).kind, TokenKind::Keyword(Keyword::Function)) {
                return self.parse_function_expr();
            }
            if let Some(arrow) = self.try_parse(|p| p.try_parse_arrow_function()) {
                return arrow;
            }
        }
        let ident = self.expect_identifier("");
        Expr {
            span: ident.span,
            kind: ExprKind::Variable(ident),
        }
    }

    fn parse_parenthesized_expr(&mut self) -> Expr {
        let start = self.peek().span;
        self.advance();
        let inner = self.parse_expression();
        self.expect(TokenKind::CloseParen, "expected ')' to close parenthesized expression");
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::Grouping(Box::new(inner)),
        }
    }

    fn parse_array_literal(&mut self) -> Expr {
        let start = self.peek().span;
        self.advance();
        let mut elements = Vec::new();
        while !self.check(TokenKind::CloseBracket) && !self.is_at_end() {
            if self.check(TokenKind::Comma) {
                elements.push(ArrayElement::Hole);
                self.advance();
                continue;
            }
            if self.matches(TokenKind::DotDotDot) {
                elements.push(ArrayElement::Spread(self.parse_assignment_expr()));
            } else {
                elements.push(ArrayElement::Item(self.parse_assignment_expr()));
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBracket, "expected ']' to close array literal");
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::ArrayLiteral(elements),
        }
    }

    fn parse_object_literal(&mut self) -> Expr {
        let start = self.peek().span;
        self.advance();
        let mut props = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            props.push(self.parse_object_property());
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close object literal");
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::ObjectLiteral(props),
        }
    }

    fn parse_object_property(&mut self) -> ObjectProperty {
        if self.matches(TokenKind::DotDotDot) {
            let expr = self.parse_assignment_expr();
            return ObjectProperty {
                key: PropertyKey::Identifier(sharpts_common::Atom::new("")),
                value: Some(expr),
                kind: PropertyKind::Spread,
            };
        }
        let is_async = self.check_keyword(Keyword::Async) && !self.peek_at(1).preceded_by_newline
            && !matches!(self.peek_at(1).kind, TokenKind::Colon | TokenKind::Comma | TokenKind::CloseBrace | TokenKind::OpenParen);
        if is_async {
            self.advance();
        }
        let is_generator = self.matches(TokenKind::Asterisk);
        if self.check_keyword(Keyword::Get)
            && !matches!(self.peek_at(1).kind, TokenKind::Colon | TokenKind::Comma | TokenKind::CloseBrace | TokenKind::OpenParen)
        {
            let start = self.peek().span;
            self.advance();
            let key = self.parse_property_key();
            let function = self.parse_function_tail(FunctionModifiers::default());
            let span = start.merge(self.previous().span);
            let body = function.body.unwrap_or_else(|| empty_block());
            return ObjectProperty {
                key,
                value: Some(Expr {
                    span,
                    kind: ExprKind::ArrowFunction(Box::new(ArrowFunction {
                        type_params: function.type_params,
                        params: function.params,
                        return_type: function.return_type,
                        body: ArrowBody::Block(body),
                        flags: FunctionFlags::default(),
                    })),
                }),
                kind: PropertyKind::Get,
            };
        }
        if self.check_keyword(Keyword::Set)
            && !matches!(self.peek_at(1).kind, TokenKind::Colon | TokenKind::Comma | TokenKind::CloseBrace | TokenKind::OpenParen)
        {
            let start = self.peek().span;
            self.advance();
            let key = self.parse_property_key();
            let function = self.parse_function_tail(FunctionModifiers::default());
            let span = start.merge(self.previous().span);
            let body = function.body.unwrap_or_else(|| empty_block());
            return ObjectProperty {
                key,
                value: Some(Expr {
                    span,
                    kind: ExprKind::ArrowFunction(Box::new(ArrowFunction {
                        type_params: function.type_params,
                        params: function.params,
                        return_type: function.return_type,
                        body: ArrowBody::Block(body),
                        flags: FunctionFlags::default(),
                    })),
                }),
                kind: PropertyKind::Set,
            };
        }
        let key_start = self.peek().span;
        let key = self.parse_property_key();
        if self.check(TokenKind::OpenParen) || self.check(TokenKind::LessThan) {
            let modifiers = FunctionModifiers {
                is_async,
                is_generator,
                ..FunctionModifiers::default()
            };
            let function = self.parse_function_tail(modifiers);
            let span = key_start.merge(self.previous().span);
            let body = function.body.unwrap_or_else(|| empty_block());
            return ObjectProperty {
                key,
                value: Some(Expr {
                    span,
                    kind: ExprKind::ArrowFunction(Box::new(ArrowFunction {
                        type_params: function.type_params,
                        params: function.params,
                        return_type: function.return_type,
                        body: ArrowBody::Block(body),
                        flags: FunctionFlags {
                            is_async,
                            is_generator,
                            has_own_this: true,
                        },
                    })),
                }),
                kind: PropertyKind::Method,
            };
        }
        if self.matches(TokenKind::Colon) {
            let value = self.parse_assignment_expr();
            return ObjectProperty {
                key,
                value: Some(value),
                kind: PropertyKind::Init,
            };
        }
        ObjectProperty {
            key,
            value: None,
            kind: PropertyKind::Shorthand,
        }
    }

    pub(crate) fn parse_property_key(&mut self) -> PropertyKey {
        if self.check(TokenKind::OpenBracket) {
            self.advance();
            let expr = self.parse_assignment_expr();
            self.expect(TokenKind::CloseBracket, "expected ']' to close computed key");
            return PropertyKey::Computed(Box::new(expr));
        }
        if self.check(TokenKind::StringLiteral) {
            let tok = self.advance();
            return PropertyKey::StringLiteral(literal_string(&tok));
        }
        if self.check(TokenKind::NumericLiteral) {
            let tok = self.advance();
            let value = match tok.literal {
                Some(LiteralValue::Number(n)) => n,
                _ => 0.0,
            };
            return PropertyKey::NumberLiteral(value);
        }
        PropertyKey::Identifier(self.expect_identifier("in property key").name)
    }

    fn parse_template_literal(&mut self) -> Expr {
        let start = self.peek().span;
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let first = self.advance();
        quasis.push(literal_string(&first));
        if first.kind == TokenKind::NoSubstitutionTemplateLiteral {
            return Expr {
                span: first.span,
                kind: ExprKind::TemplateLiteral { quasis, exprs },
            };
        }
        loop {
            exprs.push(self.parse_expression());
            let tok = self.advance();
            let is_tail = tok.kind == TokenKind::TemplateTail;
            quasis.push(literal_string(&tok));
            if is_tail || self.is_at_end() {
                break;
            }
        }
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::TemplateLiteral { quasis, exprs },
        }
    }

    /// Speculatively parse `(params) => body` or `ident => body`, possibly
    /// preceded by `async` and/or an explicit type-parameter list.
    fn try_parse_arrow_function(&mut self) -> Option<Expr> {
        let start = self.peek().span;
        let is_async = self.check_keyword(Keyword::Async) && !self.peek_at(1).preceded_by_newline;
        if is_async {
            self.advance();
        }
        let type_params = self.parse_optional_type_params();
        let (params, return_type) = if self.check(TokenKind::OpenParen) {
            self.advance();
            let params = self.parse_param_list();
            self.expect(TokenKind::CloseParen, "")?;
            let return_type = if self.matches(TokenKind::Colon) {
                Some(self.parse_type())
            } else {
                None
            };
            (params, return_type)
        } else if self.check_identifier_like() && !type_params.is_empty() {
            return None;
        } else if self.check_identifier_like() {
            let ident = self.expect_identifier("");
            (
                vec![Param {
                    pattern: BindingPattern::Identifier(ident),
                    type_annotation: None,
                    default: None,
                    optional: false,
                    rest: false,
                    modifier: ParamModifier::None,
                }],
                None,
            )
        } else {
            return None;
        };
        if self.peek().preceded_by_newline && self.check(TokenKind::EqualsGreaterThan) {
            // still valid; arrow body starts after '=>'
        }
        if !self.matches(TokenKind::EqualsGreaterThan) {
            return None;
        }
        let body = if self.check(TokenKind::OpenBrace) {
            ArrowBody::Block(Box::new(self.parse_block_statement()))
        } else {
            ArrowBody::Expr(Box::new(self.parse_assignment_expr()))
        };
        let span = start.merge(self.previous().span);
        Some(Expr {
            span,
            kind: ExprKind::ArrowFunction(Box::new(ArrowFunction {
                type_params,
                params,
                return_type,
                body,
                flags: FunctionFlags {
                    is_async,
                    is_generator: false,
                    has_own_this: false,
                },
            })),
        })
    }

    /// Parses a `function` expression. Async is detected and consumed by
    /// the caller (`parse_identifier_or_async_function`) before reaching
    /// here for the `async function` form; bare `function` arrives
    /// directly from `parse_primary_expr`.
    fn parse_function_expr(&mut self) -> Expr {
        let start = self.peek().span;
        self.advance(); // 'function'
        let is_generator = self.matches(TokenKind::Asterisk);
        // Named function expressions bind their own name inside the body
        // for recursion; `ArrowFunction` (what every function value lowers
        // to here) has no name slot, so a self-reference must go through
        // an enclosing `const` binding instead.
        let _name = if self.check_identifier_like() {
            Some(self.expect_identifier("function name"))
        } else {
            None
        };
        let modifiers = FunctionModifiers {
            is_generator,
            ..FunctionModifiers::default()
        };
        let function = self.parse_function_tail(modifiers);
        let span = start.merge(self.previous().span);
        let body = function.body.unwrap_or_else(|| empty_block());
        Expr {
            span,
            kind: ExprKind::ArrowFunction(Box::new(ArrowFunction {
                type_params: function.type_params,
                params: function.params,
                return_type: function.return_type,
                body: ArrowBody::Block(body),
                flags: FunctionFlags {
                    is_async: false,
                    is_generator,
                    has_own_this: true,
                },
            })),
        }
    }

    fn parse_class_expr(&mut self) -> Expr {
        let start = self.peek().span;
        let decl = self.parse_class_tail(Vec::new());
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::ClassExpr(Box::new(decl)),
        }
    }
}

fn empty_block() -> Box<Stmt> {
    Box::new(Stmt {
        span: Span::synthetic(),
        kind: StmtKind::Block(Vec::new()),
    })
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span.merge(right.span),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn literal_string(tok: &sharpts_lexer::Token) -> String {
    match &tok.literal {
        Some(LiteralValue::Str(s)) => s.clone(),
        _ => String::new(),
    }
}

fn compound_assign_op(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::PlusEquals => BinaryOp::Add,
        TokenKind::MinusEquals => BinaryOp::Sub,
        TokenKind::AsteriskEquals => BinaryOp::Mul,
        TokenKind::SlashEquals => BinaryOp::Div,
        TokenKind::PercentEquals => BinaryOp::Mod,
        TokenKind::AsteriskAsteriskEquals => BinaryOp::Pow,
        TokenKind::LessThanLessThanEquals => BinaryOp::Shl,
        TokenKind::GreaterThanGreaterThanEquals => BinaryOp::Shr,
        TokenKind::GreaterThanGreaterThanGreaterThanEquals => BinaryOp::UShr,
        TokenKind::AmpersandEquals => BinaryOp::BitAnd,
        TokenKind::BarEquals => BinaryOp::BitOr,
        TokenKind::CaretEquals => BinaryOp::BitXor,
        _ => unreachable!("compound_assign_op called with non-compound-assignment token"),
    }
}
