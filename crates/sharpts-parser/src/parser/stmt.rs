//! Statement parsing: declarations,
//! control flow, `try`/`catch`/`finally`, `using` resource declarations,
//! and the destructuring-declarator desugar into a `Sequence` of
//! temp-bound declarations.

use super::Parser;
use crate::ast::*;
use sharpts_common::Span;
use sharpts_lexer::{Keyword, TokenKind};

impl<'src> Parser<'src> {
    pub(crate) fn parse_statement(&mut self) -> Stmt {
        let stmt = self.parse_statement_inner();
        if stmt.is_none() {
            self.synchronize();
            return Stmt {
                span: self.previous().span,
                kind: StmtKind::Empty,
            };
        }
        stmt.unwrap()
    }

    fn parse_statement_inner(&mut self) -> Option<Stmt> {
        let start = self.peek().span;
        let decorators = self.parse_leading_decorators();
        if !decorators.is_empty() {
            if self.check_keyword(Keyword::Class) || self.is_abstract_class_start() {
                let class = self.parse_class_tail(decorators);
                return Some(Stmt {
                    span: start.merge(self.previous().span),
                    kind: StmtKind::Class(class),
                });
            }
            return Some(Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::FileDirective(decorators),
            });
        }
        match self.peek().kind {
            TokenKind::OpenBrace => Some(self.parse_block_statement()),
            TokenKind::Semicolon => {
                self.advance();
                Some(Stmt {
                    span: start,
                    kind: StmtKind::Empty,
                })
            }
            TokenKind::Keyword(Keyword::Var) | TokenKind::Keyword(Keyword::Let) | TokenKind::Keyword(Keyword::Const) => {
                Some(self.parse_var_statement())
            }
            TokenKind::Keyword(Keyword::Function) => Some(self.parse_function_statement(false)),
            TokenKind::Keyword(Keyword::Async) if matches!(self.peek_at(1).kind, TokenKind::Keyword(Keyword::Function)) => {
                self.advance();
                Some(self.parse_function_statement(true))
            }
            TokenKind::Keyword(Keyword::Class) => {
                let class = self.parse_class_tail(Vec::new());
                Some(Stmt {
                    span: start.merge(self.previous().span),
                    kind: StmtKind::Class(class),
                })
            }
            TokenKind::Keyword(Keyword::Abstract) if self.is_abstract_class_start() => {
                let class = self.parse_class_tail(Vec::new());
                Some(Stmt {
                    span: start.merge(self.previous().span),
                    kind: StmtKind::Class(class),
                })
            }
            TokenKind::Keyword(Keyword::Interface) => Some(self.parse_interface_decl()),
            TokenKind::Keyword(Keyword::Type) if matches!(self.peek_at(1).kind, TokenKind::Identifier) => {
                Some(self.parse_type_alias())
            }
            TokenKind::Keyword(Keyword::Enum) => Some(self.parse_enum_decl(false)),
            TokenKind::Keyword(Keyword::Const) if matches!(self.peek_at(1).kind, TokenKind::Keyword(Keyword::Enum)) => {
                self.advance();
                Some(self.parse_enum_decl(true))
            }
            TokenKind::Keyword(Keyword::Namespace) | TokenKind::Keyword(Keyword::Module) => Some(self.parse_namespace_decl()),
            TokenKind::Keyword(Keyword::Import) => Some(self.parse_import_statement()),
            TokenKind::Keyword(Keyword::Export) => Some(self.parse_export_statement()),
            TokenKind::Keyword(Keyword::If) => Some(self.parse_if_statement()),
            TokenKind::Keyword(Keyword::While) => Some(self.parse_while_statement()),
            TokenKind::Keyword(Keyword::Do) => Some(self.parse_do_while_statement()),
            TokenKind::Keyword(Keyword::For) => Some(self.parse_for_statement()),
            TokenKind::Keyword(Keyword::Switch) => Some(self.parse_switch_statement()),
            TokenKind::Keyword(Keyword::Try) => Some(self.parse_try_statement()),
            TokenKind::Keyword(Keyword::Throw) => Some(self.parse_throw_statement()),
            TokenKind::Keyword(Keyword::Return) => Some(self.parse_return_statement()),
            TokenKind::Keyword(Keyword::Break) => Some(self.parse_break_statement()),
            TokenKind::Keyword(Keyword::Continue) => Some(self.parse_continue_statement()),
            TokenKind::Keyword(Keyword::Using) => Some(self.parse_using_statement(UsingKind::Sync)),
            TokenKind::Keyword(Keyword::Await) if self.is_await_using_start() => {
                self.advance();
                Some(self.parse_using_statement(UsingKind::Await))
            }
            TokenKind::StringLiteral if self.looks_like_directive() => Some(self.parse_directive()),
            _ => self.parse_labeled_or_expression_statement(),
        }
    }

    fn is_await_using_start(&self) -> bool {
        matches!(self.peek_at(1).kind, TokenKind::Keyword(Keyword::Using))
            && !self.peek_at(1).preceded_by_newline
    }

    fn is_abstract_class_start(&self) -> bool {
        self.check_keyword(Keyword::Abstract)
            && matches!(self.peek_at(1).kind, TokenKind::Keyword(Keyword::Class))
    }

    fn looks_like_directive(&self) -> bool {
        matches!(self.peek_at(1).kind, TokenKind::Semicolon | TokenKind::Eof)
            || self.peek_at(1).preceded_by_newline
    }

    pub(crate) fn parse_leading_decorators(&mut self) -> Vec<Decorator> {
        let mut decorators = Vec::new();
        while self.check(TokenKind::At) {
            decorators.push(self.parse_decorator());
        }
        decorators
    }

    pub(crate) fn parse_block_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.expect(TokenKind::OpenBrace, "expected '{'");
        let mut statements = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            statements.push(self.parse_statement());
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close block");
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Block(statements),
        }
    }

    fn parse_directive(&mut self) -> Stmt {
        let tok = self.advance();
        self.matches(TokenKind::Semicolon);
        let text = tok.lexeme.as_str().to_string();
        Stmt {
            span: tok.span,
            kind: StmtKind::Directive(text),
        }
    }

    // -- variable declarations ------------------------------------------

    fn parse_var_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        let kind = self.parse_var_kind();
        let declarators = self.parse_var_declarator_list();
        self.consume_statement_terminator();
        let span = start.merge(self.previous().span);
        self.desugar_var_declarators(span, kind, declarators)
    }

    fn parse_var_kind(&mut self) -> VarKind {
        if self.matches_keyword(Keyword::Var) {
            VarKind::Var
        } else if self.matches_keyword(Keyword::Let) {
            VarKind::Let
        } else {
            self.expect(TokenKind::Keyword(Keyword::Const), "expected 'const'");
            VarKind::Const
        }
    }

    fn parse_var_declarator_list(&mut self) -> Vec<VarDeclarator> {
        let mut declarators = vec![self.parse_var_declarator()];
        while self.matches(TokenKind::Comma) {
            declarators.push(self.parse_var_declarator());
        }
        declarators
    }

    fn parse_var_declarator(&mut self) -> VarDeclarator {
        let pattern = self.parse_binding_pattern();
        let definite_assignment = self.matches(TokenKind::Exclamation);
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
        VarDeclarator {
            pattern,
            type_annotation,
            initializer,
            definite_assignment,
        }
    }

    /// Every declarator whose pattern is a plain identifier stays a
    /// `VarDecl`; a destructuring pattern is rewritten into a `Sequence`
    /// that binds the initializer to a synthetic temp once and then reads
    /// each leaf identifier off the temp in turn.
    fn desugar_var_declarators(&mut self, span: Span, kind: VarKind, declarators: Vec<VarDeclarator>) -> Stmt {
        let all_simple = declarators
            .iter()
            .all(|d| matches!(d.pattern, BindingPattern::Identifier(_)));
        if all_simple {
            return Stmt {
                span,
                kind: StmtKind::VarDecl { kind, declarators },
            };
        }
        let mut statements = Vec::new();
        for declarator in declarators {
            match declarator.pattern {
                BindingPattern::Identifier(_) => {
                    statements.push(Stmt {
                        span,
                        kind: StmtKind::VarDecl {
                            kind,
                            declarators: vec![declarator],
                        },
                    });
                }
                pattern => {
                    let temp = self.next_temp_name();
                    let temp_ident = Ident { name: temp, span };
                    statements.push(Stmt {
                        span,
                        kind: StmtKind::VarDecl {
                            kind,
                            declarators: vec![VarDeclarator {
                                pattern: BindingPattern::Identifier(temp_ident.clone()),
                                type_annotation: declarator.type_annotation,
                                initializer: declarator.initializer,
                                definite_assignment: false,
                            }],
                        },
                    });
                    self.emit_pattern_bindings(&mut statements, span, kind, &pattern, &temp_ident);
                }
            }
        }
        Stmt {
            span,
            kind: StmtKind::Sequence(statements),
        }
    }

    fn emit_pattern_bindings(
        &mut self,
        statements: &mut Vec<Stmt>,
        span: Span,
        kind: VarKind,
        pattern: &BindingPattern,
        source: &Ident,
    ) {
        match pattern {
            BindingPattern::Identifier(name) => {
                statements.push(Stmt {
                    span,
                    kind: StmtKind::VarDecl {
                        kind,
                        declarators: vec![VarDeclarator {
                            pattern: BindingPattern::Identifier(name.clone()),
                            type_annotation: None,
                            initializer: Some(var_ref(source)),
                            definite_assignment: false,
                        }],
                    },
                });
            }
            BindingPattern::Array(elements) => {
                let mut index = 0i64;
                for element in elements.iter().flatten() {
                    if element.rest {
                        // Rest elements in array destructuring require
                        // slicing the remainder; represented here as a
                        // call to the runtime's array-rest helper via a
                        // synthetic `Get`-free placeholder binding name so
                        // the evaluator can special-case it by pattern.
                        let rest_value = Expr {
                            span,
                            kind: ExprKind::Call {
                                callee: Box::new(Expr {
                                    span,
                                    kind: ExprKind::Get {
                                        object: Box::new(var_ref(source)),
                                        name: sharpts_common::Atom::new("slice"),
                                        optional: false,
                                    },
                                }),
                                type_args: None,
                                args: vec![Expr {
                                    span,
                                    kind: ExprKind::Literal(Literal::Number(index as f64)),
                                }],
                                optional: false,
                            },
                        };
                        self.bind_pattern_from_expr(statements, span, kind, &element.pattern, rest_value);
                        continue;
                    }
                    let item = Expr {
                        span,
                        kind: ExprKind::GetIndex {
                            object: Box::new(var_ref(source)),
                            index: Box::new(Expr {
                                span,
                                kind: ExprKind::Literal(Literal::Number(index as f64)),
                            }),
                            optional: false,
                        },
                    };
                    let item = match &element.default {
                        Some(default) => Expr {
                            span,
                            kind: ExprKind::NullishCoalescing {
                                left: Box::new(item),
                                right: Box::new(default.clone()),
                            },
                        },
                        None => item,
                    };
                    self.bind_pattern_from_expr(statements, span, kind, &element.pattern, item);
                    index += 1;
                }
            }
            BindingPattern::Object(props) => {
                for prop in props {
                    let key_expr = match &prop.key {
                        PropertyKey::Identifier(name) => Expr {
                            span,
                            kind: ExprKind::Get {
                                object: Box::new(var_ref(source)),
                                name: name.clone(),
                                optional: false,
                            },
                        },
                        PropertyKey::StringLiteral(s) => Expr {
                            span,
                            kind: ExprKind::GetIndex {
                                object: Box::new(var_ref(source)),
                                index: Box::new(Expr {
                                    span,
                                    kind: ExprKind::Literal(Literal::Str(s.clone())),
                                }),
                                optional: false,
                            },
                        },
                        PropertyKey::NumberLiteral(n) => Expr {
                            span,
                            kind: ExprKind::GetIndex {
                                object: Box::new(var_ref(source)),
                                index: Box::new(Expr {
                                    span,
                                    kind: ExprKind::Literal(Literal::Number(*n)),
                                }),
                                optional: false,
                            },
                        },
                        PropertyKey::Computed(expr) => Expr {
                            span,
                            kind: ExprKind::GetIndex {
                                object: Box::new(var_ref(source)),
                                index: expr.clone(),
                                optional: false,
                            },
                        },
                    };
                    let value = match &prop.value.default {
                        Some(default) => Expr {
                            span,
                            kind: ExprKind::NullishCoalescing {
                                left: Box::new(key_expr),
                                right: Box::new(default.clone()),
                            },
                        },
                        None => key_expr,
                    };
                    self.bind_pattern_from_expr(statements, span, kind, &prop.value.pattern, value);
                }
            }
        }
    }

    fn bind_pattern_from_expr(
        &mut self,
        statements: &mut Vec<Stmt>,
        span: Span,
        kind: VarKind,
        pattern: &BindingPattern,
        value: Expr,
    ) {
        match pattern {
            BindingPattern::Identifier(name) => {
                statements.push(Stmt {
                    span,
                    kind: StmtKind::VarDecl {
                        kind,
                        declarators: vec![VarDeclarator {
                            pattern: BindingPattern::Identifier(name.clone()),
                            type_annotation: None,
                            initializer: Some(value),
                            definite_assignment: false,
                        }],
                    },
                });
            }
            nested => {
                let temp = self.next_temp_name();
                let temp_ident = Ident { name: temp, span };
                statements.push(Stmt {
                    span,
                    kind: StmtKind::VarDecl {
                        kind,
                        declarators: vec![VarDeclarator {
                            pattern: BindingPattern::Identifier(temp_ident.clone()),
                            type_annotation: None,
                            initializer: Some(value),
                            definite_assignment: false,
                        }],
                    },
                });
                self.emit_pattern_bindings(statements, span, kind, nested, &temp_ident);
            }
        }
    }

    fn consume_statement_terminator(&mut self) {
        if self.matches(TokenKind::Semicolon) {
            return;
        }
        // Automatic semicolon insertion: a newline, `}`, or EOF before the
        // next token silently terminates the statement.
        if self.peek().preceded_by_newline || self.check(TokenKind::CloseBrace) || self.is_at_end() {
            return;
        }
        let span = self.peek().span;
        self.error(span, "expected ';'");
    }

    // -- functions --------------------------------------------------------

    fn parse_function_statement(&mut self, is_async: bool) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'function'
        let is_generator = self.matches(TokenKind::Asterisk);
        let name = Some(self.expect_identifier("function name"));
        let modifiers = FunctionModifiers {
            is_async,
            is_generator,
            ..FunctionModifiers::default()
        };
        let mut function = self.parse_function_tail(modifiers);
        function.name = name;
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Function(function),
        }
    }

    /// Shared by function declarations, function expressions, methods, and
    /// accessors: `[<T>](params)[: T] { body }` or `;` for an overload
    /// signature with no body.
    pub(crate) fn parse_function_tail(&mut self, modifiers: FunctionModifiers) -> FunctionDecl {
        let type_params = self.parse_optional_type_params();
        self.expect(TokenKind::OpenParen, "expected '(' in function parameters");
        let mut this_param = None;
        let mut params = Vec::new();
        while !self.check(TokenKind::CloseParen) && !self.is_at_end() {
            if params.is_empty()
                && this_param.is_none()
                && self.check_identifier_like()
                && self.peek().lexeme.as_str().as_ref() == "this"
            {
                self.advance();
                if self.matches(TokenKind::Colon) {
                    this_param = Some(self.parse_type());
                }
            } else {
                params.push(self.parse_param());
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')' to close function parameters");
        let return_type = if self.matches(TokenKind::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        let body = if self.check(TokenKind::OpenBrace) {
            Some(Box::new(self.parse_block_statement()))
        } else {
            self.matches(TokenKind::Semicolon);
            None
        };
        FunctionDecl {
            name: None,
            type_params,
            this_param,
            params,
            return_type,
            body,
            modifiers,
        }
    }

    // -- interfaces / type aliases / enums / namespaces -------------------

    fn parse_interface_decl(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let name = self.expect_identifier("interface name");
        let type_params = self.parse_optional_type_params();
        let mut extends = Vec::new();
        if self.matches_keyword(Keyword::Extends) {
            loop {
                extends.push(self.parse_type());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::OpenBrace, "expected '{' in interface body");
        let mut members = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            members.push(self.parse_type_member_pub());
            self.matches(TokenKind::Semicolon);
            self.matches(TokenKind::Comma);
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close interface body");
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Interface(InterfaceDecl {
                name,
                type_params,
                extends,
                members,
            }),
        }
    }

    fn parse_type_alias(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'type'
        let name = self.expect_identifier("type alias name");
        let type_params = self.parse_optional_type_params();
        self.expect(TokenKind::Equals, "expected '=' in type alias");
        let ty = self.parse_type();
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::TypeAlias {
                name,
                type_params,
                ty,
            },
        }
    }

    fn parse_enum_decl(&mut self, is_const: bool) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'enum'
        let name = self.expect_identifier("enum name");
        self.expect(TokenKind::OpenBrace, "expected '{' in enum body");
        let mut members = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            let member_name = self.expect_identifier("enum member name").name;
            let initializer = if self.matches(TokenKind::Equals) {
                Some(self.parse_assignment_expr())
            } else {
                None
            };
            members.push(EnumMember {
                name: member_name,
                initializer,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close enum body");
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Enum(EnumDecl {
                name,
                is_const,
                members,
            }),
        }
    }

    fn parse_namespace_decl(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'namespace' | 'module'
        let mut path = vec![self.expect_identifier("namespace name").name];
        while self.matches(TokenKind::Dot) {
            path.push(self.expect_identifier("in namespace path").name);
        }
        let joined = path
            .iter()
            .map(|a| a.as_str().to_string())
            .collect::<Vec<_>>()
            .join(".");
        let body_stmt = self.parse_block_statement();
        let body = match body_stmt.kind {
            StmtKind::Block(stmts) => stmts,
            _ => Vec::new(),
        };
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Namespace(NamespaceDecl {
                name: sharpts_common::Atom::new(&joined),
                body,
            }),
        }
    }

    // -- imports / exports -------------------------------------------------

    fn parse_import_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'import'
        if self.check(TokenKind::OpenParen) {
            // `import(...)` as a statement-level dynamic import expression.
            self.advance();
            let spec = self.parse_assignment_expr();
            self.expect(TokenKind::CloseParen, "expected ')' to close dynamic import");
            let expr = Expr {
                span: start.merge(self.previous().span),
                kind: ExprKind::DynamicImport(Box::new(spec)),
            };
            let expr = self.continue_postfix_chain(expr);
            self.consume_statement_terminator();
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::Expression(expr),
            };
        }
        if self.check_identifier_like()
            && matches!(self.peek_at(1).kind, TokenKind::Equals)
        {
            let name = self.expect_identifier("import alias name");
            self.expect(TokenKind::Equals, "expected '=' in import alias");
            let mut target = vec![self.expect_identifier("import alias target").name];
            while self.matches(TokenKind::Dot) {
                target.push(self.expect_identifier("in import alias path").name);
            }
            self.consume_statement_terminator();
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::ImportAlias(ImportAliasDecl { name, target }),
            };
        }
        let kind = if self.check_keyword(Keyword::Type)
            && !matches!(self.peek_at(1).kind, TokenKind::Comma | TokenKind::Keyword(Keyword::From))
        {
            self.advance();
            ImportExportKind::TypeOnly
        } else {
            ImportExportKind::Value
        };
        let mut default_import = None;
        let mut namespace_import = None;
        let mut named = Vec::new();
        if self.check_identifier_like() {
            default_import = Some(self.expect_identifier("default import name"));
            self.matches(TokenKind::Comma);
        }
        if self.matches(TokenKind::Asterisk) {
            self.expect(TokenKind::Keyword(Keyword::As), "expected 'as' in namespace import");
            namespace_import = Some(self.expect_identifier("namespace import name"));
        } else if self.matches(TokenKind::OpenBrace) {
            while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
                let spec_kind = if self.check_keyword(Keyword::Type)
                    && !matches!(self.peek_at(1).kind, TokenKind::Comma | TokenKind::CloseBrace | TokenKind::Keyword(Keyword::As))
                {
                    self.advance();
                    ImportExportKind::TypeOnly
                } else {
                    ImportExportKind::Value
                };
                let imported = self.expect_identifier("imported name").name;
                let local = if self.matches_keyword(Keyword::As) {
                    self.expect_identifier("local import alias")
                } else {
                    Ident {
                        name: imported.clone(),
                        span: self.previous().span,
                    }
                };
                named.push(ImportSpecifier {
                    imported,
                    local,
                    kind: spec_kind,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::CloseBrace, "expected '}' to close named imports");
        }
        self.expect(TokenKind::Keyword(Keyword::From), "expected 'from' in import declaration");
        let module_specifier = self.expect_string_literal("module specifier");
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Import(ImportDecl {
                default_import,
                namespace_import,
                named,
                module_specifier,
                kind,
            }),
        }
    }

    fn expect_string_literal(&mut self, context: &str) -> String {
        if self.check(TokenKind::StringLiteral) {
            let tok = self.advance();
            match tok.literal {
                Some(sharpts_lexer::LiteralValue::Str(s)) => s,
                _ => String::new(),
            }
        } else {
            let span = self.peek().span;
            self.error(span, format!("expected string literal {context}"));
            String::new()
        }
    }

    fn parse_export_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'export'
        if self.matches_keyword(Keyword::Default) {
            let expr = if self.check_keyword(Keyword::Function) || self.check_keyword(Keyword::Class) {
                let decl = self.parse_statement();
                return Stmt {
                    span: start.merge(decl.span),
                    kind: StmtKind::Export(ExportDecl::Declaration(Box::new(decl))),
                };
            } else {
                self.parse_assignment_expr()
            };
            self.consume_statement_terminator();
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::Export(ExportDecl::Default(Box::new(expr))),
            };
        }
        if self.matches(TokenKind::Asterisk) {
            let alias = if self.matches_keyword(Keyword::As) {
                Some(self.expect_identifier("re-export alias"))
            } else {
                None
            };
            self.expect(TokenKind::Keyword(Keyword::From), "expected 'from' in re-export");
            let module_specifier = self.expect_string_literal("module specifier");
            self.consume_statement_terminator();
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::Export(ExportDecl::ReExportAll {
                    module_specifier,
                    alias,
                }),
            };
        }
        if self.check(TokenKind::OpenBrace)
            || (self.check_keyword(Keyword::Type) && matches!(self.peek_at(1).kind, TokenKind::OpenBrace))
        {
            let kind = if self.matches_keyword(Keyword::Type) {
                ImportExportKind::TypeOnly
            } else {
                ImportExportKind::Value
            };
            self.advance(); // '{'
            let mut specifiers = Vec::new();
            while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
                let local = self.expect_identifier("exported name").name;
                let exported = if self.matches_keyword(Keyword::As) {
                    self.expect_identifier("export alias")
                } else {
                    Ident {
                        name: local.clone(),
                        span: self.previous().span,
                    }
                };
                specifiers.push(ExportSpecifier {
                    local,
                    exported,
                    kind,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::CloseBrace, "expected '}' to close export list");
            let module_specifier = if self.matches_keyword(Keyword::From) {
                Some(self.expect_string_literal("module specifier"))
            } else {
                None
            };
            self.consume_statement_terminator();
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::Export(ExportDecl::Named {
                    specifiers,
                    module_specifier,
                    kind,
                }),
            };
        }
        let decl = self.parse_statement();
        Stmt {
            span: start.merge(decl.span),
            kind: StmtKind::Export(ExportDecl::Declaration(Box::new(decl))),
        }
    }

    // -- control flow -------------------------------------------------------

    fn parse_if_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        self.expect(TokenKind::OpenParen, "expected '(' after 'if'");
        let condition = self.parse_expression();
        self.expect(TokenKind::CloseParen, "expected ')' after if condition");
        let then_branch = Box::new(self.parse_statement());
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()))
        } else {
            None
        };
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        }
    }

    fn parse_while_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        self.expect(TokenKind::OpenParen, "expected '(' after 'while'");
        let condition = self.parse_expression();
        self.expect(TokenKind::CloseParen, "expected ')' after while condition");
        let body = Box::new(self.parse_statement());
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::While { condition, body },
        }
    }

    fn parse_do_while_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let body = Box::new(self.parse_statement());
        self.expect(TokenKind::Keyword(Keyword::While), "expected 'while' after do-body");
        self.expect(TokenKind::OpenParen, "expected '(' after 'while'");
        let condition = self.parse_expression();
        self.expect(TokenKind::CloseParen, "expected ')' after do-while condition");
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::DoWhile { body, condition },
        }
    }

    /// All of `for (;;)`, `for (x in obj)`, `for (x of xs)`, and
    /// `for await (x of xs)` share a header; the discriminating keyword
    /// (`in`/`of`) only appears after the first clause is parsed.
    fn parse_for_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance(); // 'for'
        let is_await = self.matches_keyword(Keyword::Await);
        self.expect(TokenKind::OpenParen, "expected '(' after 'for'");

        if self.check(TokenKind::Semicolon) {
            self.advance();
            return self.finish_classic_for(start, None);
        }

        if matches!(
            self.peek().kind,
            TokenKind::Keyword(Keyword::Var) | TokenKind::Keyword(Keyword::Let) | TokenKind::Keyword(Keyword::Const)
        ) {
            let kind = self.parse_var_kind();
            let pattern = self.parse_binding_pattern();
            if self.matches_keyword(Keyword::Of) {
                let iterable = self.parse_assignment_expr();
                self.expect(TokenKind::CloseParen, "expected ')' after for-of header");
                let body = Box::new(self.parse_statement());
                return Stmt {
                    span: start.merge(self.previous().span),
                    kind: StmtKind::ForOf {
                        kind,
                        pattern,
                        iterable,
                        body,
                        r#await: if is_await { ForOfAwait::Await } else { ForOfAwait::Sync },
                    },
                };
            }
            if self.matches_keyword(Keyword::In) {
                let object = self.parse_expression();
                self.expect(TokenKind::CloseParen, "expected ')' after for-in header");
                let body = Box::new(self.parse_statement());
                return Stmt {
                    span: start.merge(self.previous().span),
                    kind: StmtKind::ForIn {
                        kind,
                        pattern,
                        object,
                        body,
                    },
                };
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
            let mut declarators = vec![VarDeclarator {
                pattern,
                type_annotation,
                initializer,
                definite_assignment: false,
            }];
            while self.matches(TokenKind::Comma) {
                declarators.push(self.parse_var_declarator());
            }
            self.expect(TokenKind::Semicolon, "expected ';' after for-loop initializer");
            return self.finish_classic_for(start, Some(ForInit::VarDecl(kind, declarators)));
        }

        let expr = self.parse_expression();
        if self.matches_keyword(Keyword::Of) {
            let pattern = self.expr_to_binding_pattern(expr);
            let iterable = self.parse_assignment_expr();
            self.expect(TokenKind::CloseParen, "expected ')' after for-of header");
            let body = Box::new(self.parse_statement());
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::ForOf {
                    kind: VarKind::Let,
                    pattern,
                    iterable,
                    body,
                    r#await: if is_await { ForOfAwait::Await } else { ForOfAwait::Sync },
                },
            };
        }
        if self.matches_keyword(Keyword::In) {
            let pattern = self.expr_to_binding_pattern(expr);
            let object = self.parse_expression();
            self.expect(TokenKind::CloseParen, "expected ')' after for-in header");
            let body = Box::new(self.parse_statement());
            return Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::ForIn {
                    kind: VarKind::Let,
                    pattern,
                    object,
                    body,
                },
            };
        }
        self.expect(TokenKind::Semicolon, "expected ';' after for-loop initializer");
        self.finish_classic_for(start, Some(ForInit::Expr(expr)))
    }

    fn expr_to_binding_pattern(&mut self, expr: Expr) -> BindingPattern {
        match expr.kind {
            ExprKind::Variable(ident) => BindingPattern::Identifier(ident),
            _ => {
                self.error(expr.span, "expected a simple binding target in for-in/for-of header");
                BindingPattern::Identifier(Ident {
                    name: sharpts_common::Atom::new("<error>"),
                    span: expr.span,
                })
            }
        }
    }

    fn finish_classic_for(&mut self, start: Span, init: Option<ForInit>) -> Stmt {
        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::Semicolon, "expected ';' after for-loop condition");
        let update = if self.check(TokenKind::CloseParen) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::CloseParen, "expected ')' after for-loop header");
        let body = Box::new(self.parse_statement());
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::For {
                init: init.map(Box::new),
                condition,
                update,
                body,
            },
        }
    }

    fn parse_switch_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        self.expect(TokenKind::OpenParen, "expected '(' after 'switch'");
        let discriminant = self.parse_expression();
        self.expect(TokenKind::CloseParen, "expected ')' after switch discriminant");
        self.expect(TokenKind::OpenBrace, "expected '{' in switch body");
        let mut cases = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.is_at_end() {
            let test = if self.matches_keyword(Keyword::Case) {
                let expr = self.parse_expression();
                Some(expr)
            } else {
                self.expect(TokenKind::Keyword(Keyword::Default), "expected 'case' or 'default'");
                None
            };
            self.expect(TokenKind::Colon, "expected ':' after case label");
            let mut body = Vec::new();
            while !matches!(
                self.peek().kind,
                TokenKind::Keyword(Keyword::Case) | TokenKind::Keyword(Keyword::Default) | TokenKind::CloseBrace
            ) && !self.is_at_end()
            {
                body.push(self.parse_statement());
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect(TokenKind::CloseBrace, "expected '}' to close switch body");
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Switch { discriminant, cases },
        }
    }

    fn parse_try_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let try_block = Box::new(self.parse_block_statement());
        let mut catch_param = None;
        let mut catch_block = None;
        if self.matches_keyword(Keyword::Catch) {
            if self.matches(TokenKind::OpenParen) {
                catch_param = Some(self.parse_binding_pattern());
                self.expect(TokenKind::CloseParen, "expected ')' after catch parameter");
            }
            catch_block = Some(Box::new(self.parse_block_statement()));
        }
        let finally_block = if self.matches_keyword(Keyword::Finally) {
            Some(Box::new(self.parse_block_statement()))
        } else {
            None
        };
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::TryCatch {
                try_block,
                catch_param,
                catch_block,
                finally_block,
            },
        }
    }

    fn parse_throw_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let expr = self.parse_expression();
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Throw(expr),
        }
    }

    fn parse_return_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::CloseBrace)
            || self.is_at_end()
            || self.peek().preceded_by_newline
        {
            None
        } else {
            Some(self.parse_expression())
        };
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Return(value),
        }
    }

    fn parse_break_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let label = if !self.peek().preceded_by_newline && self.check_identifier_like() {
            Some(self.expect_identifier("label"))
        } else {
            None
        };
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Break(label),
        }
    }

    fn parse_continue_statement(&mut self) -> Stmt {
        let start = self.peek().span;
        self.advance();
        let label = if !self.peek().preceded_by_newline && self.check_identifier_like() {
            Some(self.expect_identifier("label"))
        } else {
            None
        };
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Continue(label),
        }
    }

    fn parse_using_statement(&mut self, kind: UsingKind) -> Stmt {
        let start = self.peek().span;
        self.expect(TokenKind::Keyword(Keyword::Using), "expected 'using'");
        let mut declarators = vec![self.parse_using_declarator()];
        while self.matches(TokenKind::Comma) {
            declarators.push(self.parse_using_declarator());
        }
        self.consume_statement_terminator();
        Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Using { kind, declarators },
        }
    }

    fn parse_using_declarator(&mut self) -> UsingDeclarator {
        let name = self.expect_identifier("using declaration name");
        self.expect(TokenKind::Equals, "expected '=' in using declaration");
        let initializer = self.parse_assignment_expr();
        UsingDeclarator { name, initializer }
    }

    fn parse_labeled_or_expression_statement(&mut self) -> Option<Stmt> {
        let start = self.peek().span;
        if self.check_identifier_like() && matches!(self.peek_at(1).kind, TokenKind::Colon) {
            let label = self.expect_identifier("label name");
            self.advance(); // ':'
            let body = Box::new(self.parse_statement());
            return Some(Stmt {
                span: start.merge(self.previous().span),
                kind: StmtKind::Labeled { label, body },
            });
        }
        let expr = self.parse_expression();
        self.consume_statement_terminator();
        Some(Stmt {
            span: start.merge(self.previous().span),
            kind: StmtKind::Expression(expr),
        })
    }
}

fn var_ref(ident: &Ident) -> Expr {
    Expr {
        span: ident.span,
        kind: ExprKind::Variable(ident.clone()),
    }
}
