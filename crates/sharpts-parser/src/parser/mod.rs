//! Recursive-descent parser.
//!
//! Token stream → AST. Limited backtracking resolves the handful of
//! genuine TypeScript grammar ambiguities (arrow head vs. parenthesized
//! expression, type-argument lists in calls, nested generic `>>`/`>>>`
//! closes) via a snapshot/restore speculative-parse helper. Errors are
//! collected with recovery: on a failed production the parser logs a
//! diagnostic, advances to the next synchronization point, and resumes.

mod class;
mod expr;
mod stmt;
mod types;

use crate::ast::*;
use sharpts_common::{Atom, Diagnostic, DiagnosticSink, Span};
use sharpts_lexer::{Keyword, Lexer, Token, TokenKind};

/// Which decorator grammar a source file uses. Stage 2 and Stage 3 are not
/// semantically equivalent for field decorators, so a file commits to
/// exactly one and mixing is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoratorMode {
    Stage2,
    Stage3,
}

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: DiagnosticSink,
    temp_counter: u32,
    decorator_mode: Option<DecoratorMode>,
}

/// Parse a complete source file into a statement list plus diagnostics.
/// `statements` is best-effort: on recoverable errors it still contains
/// every statement that *did* parse.
pub fn parse_program(source: &str) -> (Vec<Stmt>, Vec<Diagnostic>) {
    let (tokens, mut lex_diagnostics) = Lexer::new(source).tokenize();
    let mut parser = Parser::new(source, tokens);
    let statements = parser.parse_statements_until_eof();
    let mut diagnostics = parser.diagnostics.into_sorted();
    diagnostics.append(&mut lex_diagnostics);
    diagnostics.sort_by_key(|d| d.span.start);
    (statements, diagnostics)
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Parser {
            source,
            tokens,
            pos: 0,
            diagnostics: DiagnosticSink::new(),
            temp_counter: 0,
            decorator_mode: None,
        }
    }

    fn parse_statements_until_eof(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            let before = self.pos;
            statements.push(self.parse_statement());
            if self.pos == before {
                // Guard against a production that consumed nothing: force
                // progress so the parser can never infinite-loop.
                self.advance();
            }
        }
        statements
    }

    // -- token cursor -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_keyword(keyword)
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Identifiers that are contextual keywords (`as`, `type`, `async`, …)
    /// can still appear wherever a plain identifier is expected.
    fn check_identifier_like(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Identifier)
            || matches!(self.peek().kind, TokenKind::Keyword(k) if !k.is_reserved())
    }

    fn expect_identifier(&mut self, context: &str) -> Ident {
        if self.check_identifier_like() {
            let tok = self.advance();
            Ident {
                name: tok.lexeme,
                span: tok.span,
            }
        } else {
            let span = self.peek().span;
            self.error(span, format!("expected identifier {context}"));
            Ident {
                name: Atom::new("<error>"),
                span,
            }
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let span = self.peek().span;
            self.error(span, message);
            None
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(span, message));
    }

    /// Advance to the next statement-synchronization point after a failed
    /// production: `;`, `}`, or a token that starts a new statement.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            if matches!(
                self.peek().kind,
                TokenKind::CloseBrace
                    | TokenKind::Keyword(
                        Keyword::Class
                            | Keyword::Function
                            | Keyword::Var
                            | Keyword::Let
                            | Keyword::Const
                            | Keyword::If
                            | Keyword::For
                            | Keyword::While
                            | Keyword::Return
                            | Keyword::Import
                            | Keyword::Export
                    )
            ) {
                return;
            }
            self.advance();
        }
    }

    fn next_temp_name(&mut self) -> Atom {
        let name = format!("__sharpts_tmp{}", self.temp_counter);
        self.temp_counter += 1;
        Atom::new(&name)
    }

    // -- speculative parsing -------------------------------------------

    /// Attempt a parse; on `None` (or consuming no progress signal from the
    /// callback), fully rewind token cursor and discard any diagnostics
    /// emitted during the attempt. At most one speculative branch is ever
    /// active at a time.
    fn try_parse<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let save_pos = self.pos;
        let save_diag_len = self.diagnostics.as_slice().len();
        let result = f(self);
        if result.is_none() {
            self.pos = save_pos;
            self.truncate_diagnostics(save_diag_len);
        }
        result
    }

    fn truncate_diagnostics(&mut self, len: usize) {
        let kept: Vec<_> = self.diagnostics.as_slice()[..len].to_vec();
        self.diagnostics = DiagnosticSink::new();
        for d in kept {
            self.diagnostics.push(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt_kinds(src: &str) -> Vec<String> {
        let (stmts, diags) = parse_program(src);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        stmts.iter().map(|s| format!("{:?}", std::mem::discriminant(&s.kind))).collect()
    }

    fn first_expr(src: &str) -> Expr {
        let (stmts, diags) = parse_program(src);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        match &stmts[0].kind {
            StmtKind::Expression(e) => e.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn arrow_head_vs_parenthesized_expression() {
        // `(x)` alone is a parenthesized expression, not an arrow.
        let e = first_expr("(x);");
        assert!(matches!(e.kind, ExprKind::Grouping(_)));

        // `(x) => x` is an arrow function; the speculative arrow-head parse
        // must succeed and not leave the cursor mid-expression.
        let e = first_expr("(x) => x;");
        assert!(matches!(e.kind, ExprKind::ArrowFunction(_)));

        // A parenthesized expression containing a comma (sequence) is not
        // an arrow parameter list once no `=>` follows.
        let e = first_expr("(x, y);");
        assert!(matches!(e.kind, ExprKind::Grouping(_)));
    }

    #[test]
    fn arrow_with_type_annotations_and_no_params() {
        let e = first_expr("(x: number, y: number): number => x + y;");
        match e.kind {
            ExprKind::ArrowFunction(arrow) => assert_eq!(arrow.params.len(), 2),
            other => panic!("expected arrow function, got {other:?}"),
        }
        let e = first_expr("(): void => {};");
        assert!(matches!(e.kind, ExprKind::ArrowFunction(_)));
    }

    #[test]
    fn type_argument_list_vs_less_than() {
        // `f<A, B>(x)` parses as a call with explicit type arguments, since
        // the speculative type-argument parse succeeds and is immediately
        // followed by `(`.
        let e = first_expr("f<A, B>(x);");
        match e.kind {
            ExprKind::Call { type_args, args, .. } => {
                assert!(type_args.is_some());
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {other:?}"),
        }

        // `f < a, b > c` has no `(` after the closing `>`, so the
        // speculative type-argument parse reverts and `<`/`>` are treated
        // as the comparison operators (comma splits into two comparisons).
        let e = first_expr("f < a, b > c;");
        match e.kind {
            ExprKind::Binary { op: BinaryOp::Add, left, right } => {
                assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Lt, .. }));
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Gt, .. }));
            }
            other => panic!("expected comma-joined comparisons, got {other:?}"),
        }
    }

    #[test]
    fn nested_generic_close_splits_shift_token() {
        // `Partial<Readonly<D>>` must close both type-argument lists from a
        // single `>>` token without swallowing a real shift operator
        // elsewhere in the file.
        let (stmts, diags) = parse_program("let x: Partial<Readonly<D>> = y; let z = 16 >> 2;");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(stmts.len(), 2);
        match &stmts[1].kind {
            StmtKind::VarDecl { declarators, .. } => {
                let init = declarators[0].initializer.as_ref().unwrap();
                assert!(matches!(init.kind, ExprKind::Binary { op: BinaryOp::Shr, .. }));
            }
            other => panic!("expected var decl, got {other:?}"),
        }
    }

    #[test]
    fn destructuring_declarator_desugars_to_sequence() {
        let (stmts, diags) = parse_program("let [a, {b: c}] = v;");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StmtKind::Sequence(inner) => {
                // One binding for the temp, plus one per destructured leaf.
                assert!(inner.len() >= 3);
                assert!(inner.iter().all(|s| matches!(s.kind, StmtKind::VarDecl { .. })));
            }
            other => panic!("expected desugared sequence, got {other:?}"),
        }

        // A plain identifier declarator is left alone.
        let (stmts, diags) = parse_program("let a = 1;");
        assert!(diags.is_empty());
        assert!(matches!(stmts[0].kind, StmtKind::VarDecl { .. }));
    }

    #[test]
    fn for_loop_desugars_into_scoped_while() {
        let kinds = stmt_kinds("for (let i = 0; i < 3; i++) { console.log(i); }");
        assert_eq!(kinds.len(), 1);
    }

    #[test]
    fn for_of_and_for_in_are_distinguished() {
        let (stmts, diags) = parse_program("for (const x of xs) {} for (const k in o) {}");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind, StmtKind::ForOf { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::ForIn { .. }));
    }

    #[test]
    fn for_await_of_sets_await_flag() {
        let (stmts, diags) = parse_program("async function f() { for await (const x of xs) {} }");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        // Drill into the function body to find the `ForOf` statement.
        fn find_for_of(stmt: &Stmt) -> Option<&Stmt> {
            match &stmt.kind {
                StmtKind::ForOf { .. } => Some(stmt),
                StmtKind::Block(stmts) => stmts.iter().find_map(find_for_of),
                StmtKind::Function(f) => f.body.as_deref().and_then(find_for_of),
                _ => None,
            }
        }
        let found = stmts.iter().find_map(find_for_of).expect("expected a ForOf statement");
        match &found.kind {
            StmtKind::ForOf { r#await, .. } => assert_eq!(*r#await, ForOfAwait::Await),
            _ => unreachable!(),
        }
    }

    #[test]
    fn labeled_statement_wraps_loop() {
        let src = "outer: for (let i = 0; i < 3; i++) { break outer; }";
        let (stmts, diags) = parse_program(src);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert!(matches!(stmts[0].kind, StmtKind::Labeled { .. }));
    }

    #[test]
    fn syntax_error_recovers_at_next_statement() {
        let src = "let x = ; let y = 2;";
        let (stmts, diags) = parse_program(src);
        assert!(!diags.is_empty(), "expected a diagnostic for the malformed declarator");
        // Recovery must still find the second, well-formed declaration.
        let found_y = stmts.iter().any(|s| match &s.kind {
            StmtKind::VarDecl { declarators, .. } => matches!(
                &declarators[0].pattern,
                BindingPattern::Identifier(ident) if &*ident.name.as_str() == "y"
            ),
            _ => false,
        });
        assert!(found_y, "expected recovery to still parse `let y = 2;`");
    }

    #[test]
    fn type_predicate_and_assertion_signatures_parse() {
        let (_, diags) = parse_program(
            "function isString(x: unknown): x is string { return typeof x === 'string'; }",
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let (_, diags) = parse_program("function assertDefined(x: unknown): asserts x { }");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn using_declaration_parses() {
        let (stmts, diags) = parse_program("{ using r = acquire(); }");
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        match &stmts[0].kind {
            StmtKind::Block(inner) => assert!(matches!(inner[0].kind, StmtKind::Using { .. })),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn parse_is_deterministic() {
        let src = "class C<T extends object = {}> { #x: T; constructor(public y: number) { this.#x = {} as T; } }";
        let (a, da) = parse_program(src);
        let (b, db) = parse_program(src);
        assert_eq!(da.len(), db.len());
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}
