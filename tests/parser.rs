use paw_syntax::ast::*;
use paw_syntax::token::{LitKind, Operator};
use paw_syntax::{parse_expr, parse_str, SyntaxError};

fn parse_ok(src: &str) -> File {
    let mut diags = Vec::new();
    let file = parse_str("test.paw", src, |err| diags.push(err))
        .unwrap_or_else(|err| panic!("parse failed: {err}\nsource:\n{src}"));
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}\nsource:\n{src}");
    file
}

fn parse_with_errors(src: &str) -> (Option<File>, Vec<SyntaxError>) {
    let mut diags = Vec::new();
    let file = parse_str("test.paw", src, |err| diags.push(err)).ok();
    (file, diags)
}

// =============================================================================
// Declarations
// =============================================================================

#[test]
fn space_header_and_var_decl() {
    let file = parse_ok("space m\nvar x int\n");
    assert_eq!(file.space_name.value, "m");
    assert_eq!(file.decls.len(), 1);
    match &file.decls[0] {
        Decl::Var(d) => {
            assert_eq!(d.name.value, "x");
            assert!(matches!(&d.ty, Some(Expr::Name(n)) if n.value == "int"));
            assert!(d.value.is_none());
            assert!(d.group.is_none());
        }
        d => panic!("expected var declaration, got {d:?}"),
    }
}

#[test]
fn missing_space_header_is_fatal() {
    let (file, diags) = parse_with_errors("var x int\n");
    assert!(file.is_none());
    assert!(diags[0].msg.contains("space statement must be first"), "{diags:?}");
}

#[test]
fn var_decl_forms() {
    let file = parse_ok("space m\nvar a int\nvar b = 1\nvar c []int = x\n");
    assert_eq!(file.decls.len(), 3);
    match &file.decls[1] {
        Decl::Var(d) => {
            assert!(d.ty.is_none());
            assert!(matches!(&d.value, Some(Expr::Lit(l)) if l.value == "1" && l.kind == LitKind::Int));
        }
        d => panic!("unexpected {d:?}"),
    }
    match &file.decls[2] {
        Decl::Var(d) => {
            assert!(matches!(&d.ty, Some(Expr::SliceType(_))));
            assert!(d.value.is_some());
        }
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn type_decl_and_alias() {
    let file = parse_ok("space m\ntype t int\ntype u = []int\n");
    match &file.decls[0] {
        Decl::Type(d) => {
            assert_eq!(d.name.value, "t");
            assert!(!d.alias);
        }
        d => panic!("unexpected {d:?}"),
    }
    match &file.decls[1] {
        Decl::Type(d) => {
            assert!(d.alias);
            assert!(matches!(&d.ty, Expr::SliceType(st) if matches!(&*st.elem, Expr::Name(n) if n.value == "int")));
        }
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn import_decls() {
    let file = parse_ok("space m\nimport \"foo\"\nimport (\n\t\"bar\"\n\t\"baz\"\n)\n");
    assert_eq!(file.decls.len(), 3);
    match &file.decls[0] {
        Decl::Import(d) => {
            let path = d.path.as_ref().unwrap();
            assert_eq!(path.value, "\"foo\"");
            assert_eq!(path.kind, LitKind::String);
            assert!(!path.bad);
            assert!(d.group.is_none());
        }
        d => panic!("unexpected {d:?}"),
    }
    assert!(file.decls[1].group().is_some());
    assert!(Group::same(file.decls[1].group(), file.decls[2].group()));
}

#[test]
fn import_path_must_be_a_string() {
    let (file, diags) = parse_with_errors("space m\nimport 42\n");
    let file = file.unwrap();
    assert!(diags.iter().any(|e| e.msg.contains("import path must be a string")), "{diags:?}");
    match &file.decls[0] {
        Decl::Import(d) => assert!(d.path.as_ref().unwrap().bad),
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn var_groups_share_identity() {
    let file = parse_ok("space m\nvar (\n\tx int\n\ty int\n)\nvar z int\n");
    assert_eq!(file.decls.len(), 3);
    assert!(file.decls[0].group().is_some());
    assert!(Group::same(file.decls[0].group(), file.decls[1].group()));
    assert!(file.decls[2].group().is_none());
    // a second group gets a fresh tag
    let file2 = parse_ok("space m\nvar (\n\tx int\n)\nvar (\n\ty int\n)\n");
    assert!(!Group::same(file2.decls[0].group(), file2.decls[1].group()));
}

#[test]
fn func_decl_with_body() {
    let file = parse_ok("space m; func f(a int) int { return a + 1 }");
    match &file.decls[0] {
        Decl::Func(d) => {
            assert_eq!(d.name.value, "f");
            assert_eq!(d.params.len(), 1);
            let p = &d.params[0];
            assert_eq!(p.name.as_ref().unwrap().value, "a");
            assert!(matches!(&p.ty, Expr::Name(n) if n.value == "int"));
            assert!(matches!(&d.ret, Some(Expr::Name(n)) if n.value == "int"));

            let body = d.body.as_ref().unwrap();
            assert_eq!(body.stmts.len(), 1);
            match &body.stmts[0] {
                Stmt::Return(r) => match r.result.as_ref().unwrap() {
                    Expr::Operation(op) => {
                        assert_eq!(op.op, Operator::Add);
                        assert!(matches!(&*op.x, Expr::Name(n) if n.value == "a"));
                        let y = op.y.as_ref().unwrap();
                        assert!(matches!(&**y, Expr::Lit(l) if l.value == "1" && l.kind == LitKind::Int));
                    }
                    x => panic!("unexpected return value {x:?}"),
                },
                s => panic!("unexpected statement {s:?}"),
            }
        }
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn func_decl_without_body() {
    let file = parse_ok("space m\nfunc f()\n");
    assert!(matches!(&file.decls[0], Decl::Func(d) if d.body.is_none() && d.ret.is_none()));
}

#[test]
fn oper_decl() {
    let file = parse_ok("space m\noper (a vec) add (b vec) vec { return a }\n");
    match &file.decls[0] {
        Decl::Oper(d) => {
            assert_eq!(d.op, Operator::Add);
            assert!(d.op.is_overloadable());
            assert!(!d.op.is_reversed());
            assert_eq!(d.left.name.as_ref().unwrap().value, "a");
            assert!(matches!(&d.left.ty, Expr::Name(n) if n.value == "vec"));
            assert_eq!(d.right.name.as_ref().unwrap().value, "b");
            assert!(matches!(&d.ret, Expr::Name(n) if n.value == "vec"));
            assert_eq!(d.body.stmts.len(), 1);
        }
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn reversed_oper_decl() {
    let file = parse_ok("space m\noper (a vec) radd (b scalar) vec { return a }\n");
    match &file.decls[0] {
        Decl::Oper(d) => {
            assert_eq!(d.op, Operator::RAdd);
            assert!(d.op.is_reversed());
            assert!(d.op.is_overloadable());
        }
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn unknown_oper_name_is_diagnosed() {
    let (file, diags) = parse_with_errors("space m\noper (a vec) frob (b vec) vec { }\n");
    assert!(file.is_some());
    assert!(diags.iter().any(|e| e.msg.contains("frob is not an overloadable operator")), "{diags:?}");
}

// =============================================================================
// Statements
// =============================================================================

fn first_func_body(file: &File) -> &BlockStmt {
    for d in &file.decls {
        if let Decl::Func(f) = d {
            return f.body.as_ref().expect("function has no body");
        }
    }
    panic!("no function declaration");
}

#[test]
fn statement_forms() {
    let src = "space m
func f(a int) int {
	x := 1
	x = 2
	x += 3
	x++
	x--
	var y int
	y = x
	if x > 0 {
		return x
	} else if x > 1 {
		return y
	} else {
		f(x)
	}
	while x > 0 {
		x--
		continue
	}
	for i := 0; i > 10; i++ {
		break
	}
	for {
	}
	{
		x = 1
	}
	;
	return x
}
";
    let file = parse_ok(src);
    let body = first_func_body(&file);
    let kinds: Vec<&str> = body
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::Define(_) => "define",
            Stmt::Assign(a) => {
                if a.op.is_some() {
                    "assignop"
                } else {
                    "assign"
                }
            }
            Stmt::IncDec(_) => "incdec",
            Stmt::Decl(_) => "decl",
            Stmt::If(_) => "if",
            Stmt::While(_) => "while",
            Stmt::For(_) => "for",
            Stmt::Block(_) => "block",
            Stmt::Empty(_) => "empty",
            Stmt::Return(_) => "return",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        [
            "define", "assign", "assignop", "incdec", "incdec", "decl", "assign", "if", "while",
            "for", "for", "block", "empty", "return"
        ]
    );
}

#[test]
fn inc_dec_record_the_operator() {
    let file = parse_ok("space m\nfunc f() {\n\tx++\n\ty--\n}\n");
    let body = first_func_body(&file);
    assert!(matches!(&body.stmts[0], Stmt::IncDec(s) if s.op == Operator::Add));
    assert!(matches!(&body.stmts[1], Stmt::IncDec(s) if s.op == Operator::Sub));
}

#[test]
fn for_header_parts() {
    let file = parse_ok("space m\nfunc f() {\n\tfor i := 0; i > 10; i++ {\n\t}\n}\n");
    let body = first_func_body(&file);
    match &body.stmts[0] {
        Stmt::For(f) => {
            assert!(matches!(f.init.as_deref(), Some(Stmt::Define(_))));
            assert!(matches!(&f.cond, Some(Expr::Operation(_))));
            assert!(matches!(f.post.as_deref(), Some(Stmt::IncDec(_))));
        }
        s => panic!("unexpected {s:?}"),
    }

    let file = parse_ok("space m\nfunc f() {\n\tfor x > 0 {\n\t}\n}\n");
    let body = first_func_body(&file);
    match &body.stmts[0] {
        Stmt::For(f) => {
            assert!(f.init.is_none());
            assert!(f.cond.is_some());
            assert!(f.post.is_none());
        }
        s => panic!("unexpected {s:?}"),
    }
}

#[test]
fn if_without_condition_yields_bad_expr() {
    let (file, diags) = parse_with_errors("space m\nfunc f() {\n\tif {\n\t}\n}\n");
    let file = file.unwrap();
    assert!(
        diags.iter().any(|e| e.msg.contains("missing condition in if statement")),
        "{diags:?}"
    );
    let body = first_func_body(&file);
    match &body.stmts[0] {
        Stmt::If(s) => assert!(matches!(s.cond, Expr::Bad(_))),
        s => panic!("unexpected {s:?}"),
    }
}

#[test]
fn var_in_if_initializer_is_diagnosed_but_consumed() {
    let (file, diags) = parse_with_errors("space m\nfunc f() {\n\tif var x { }\n}\n");
    assert!(file.is_some());
    assert!(
        diags.iter().any(|e| e.msg.contains("var declaration not allowed in if initializer")),
        "{diags:?}"
    );
}

#[test]
fn define_in_for_post_statement_is_diagnosed() {
    let (_, diags) =
        parse_with_errors("space m\nfunc f() {\n\tfor x := 0; x > 1; y := 2 {\n\t}\n}\n");
    assert!(
        diags.iter().any(|e| e.msg.contains("cannot declare in post statement of for loop")),
        "{diags:?}"
    );
}

#[test]
fn assignment_condition_is_rejected() {
    let (_, diags) = parse_with_errors("space m\nfunc f() {\n\tif x = 1 { }\n}\n");
    assert!(diags.iter().any(|e| e.msg.contains("cannot use") && e.msg.contains("as value")), "{diags:?}");
}

// =============================================================================
// Expressions
// =============================================================================

fn value_of_first_var(file: &File) -> &Expr {
    match &file.decls[0] {
        Decl::Var(d) => d.value.as_ref().expect("var has no value"),
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn less_than_is_canonicalized_to_greater_than() {
    let file = parse_ok("space m; var a = b < c");
    match value_of_first_var(&file) {
        Expr::Operation(op) => {
            assert_eq!(op.op, Operator::Gtr);
            assert!(matches!(&*op.x, Expr::Name(n) if n.value == "c"));
            let y = op.y.as_ref().unwrap();
            assert!(matches!(&**y, Expr::Name(n) if n.value == "b"));
        }
        x => panic!("unexpected {x:?}"),
    }
}

#[test]
fn precedence_climbing() {
    // a + b * c parses as a + (b * c)
    let file = parse_ok("space m; var v = a + b * c");
    match value_of_first_var(&file) {
        Expr::Operation(op) => {
            assert_eq!(op.op, Operator::Add);
            let y = op.y.as_ref().unwrap();
            assert!(matches!(&**y, Expr::Operation(inner) if inner.op == Operator::Mul));
        }
        x => panic!("unexpected {x:?}"),
    }

    // a || b && c parses as a || (b && c)
    let file = parse_ok("space m; var v = a || b && c");
    match value_of_first_var(&file) {
        Expr::Operation(op) => {
            assert_eq!(op.op, Operator::OrOr);
            let y = op.y.as_ref().unwrap();
            assert!(matches!(&**y, Expr::Operation(inner) if inner.op == Operator::AndAnd));
        }
        x => panic!("unexpected {x:?}"),
    }
}

#[test]
fn unary_operators() {
    for (src, op) in [
        ("space m; var v = -x", Operator::Sub),
        ("space m; var v = +x", Operator::Add),
        ("space m; var v = !x", Operator::Not),
        ("space m; var v = *x", Operator::Mul),
    ] {
        let file = parse_ok(src);
        match value_of_first_var(&file) {
            Expr::Operation(o) => {
                assert_eq!(o.op, op, "src={src}");
                assert!(o.y.is_none(), "src={src}");
            }
            x => panic!("unexpected {x:?}"),
        }
    }
}

#[test]
fn postfix_expressions() {
    let file = parse_ok("space m; var v = a.b[i](x, y)");
    match value_of_first_var(&file) {
        Expr::Call(call) => {
            assert_eq!(call.args.len(), 2);
            match &*call.func {
                Expr::Index(ix) => {
                    assert!(matches!(&*ix.x, Expr::Selector(sel) if sel.sel.value == "b"));
                }
                x => panic!("unexpected {x:?}"),
            }
        }
        x => panic!("unexpected {x:?}"),
    }
}

#[test]
fn slice_literals_and_types() {
    let file = parse_ok("space m; var v = []int{1, 2, 3}");
    match value_of_first_var(&file) {
        Expr::SliceLit(lit) => {
            assert!(matches!(&*lit.elem_type, Expr::Name(n) if n.value == "int"));
            assert_eq!(lit.elems.len(), 3);
        }
        x => panic!("unexpected {x:?}"),
    }

    let file = parse_ok("space m; var v = []int{}");
    assert!(matches!(value_of_first_var(&file), Expr::SliceLit(lit) if lit.elems.is_empty()));
}

#[test]
fn parenthesized_expressions() {
    let file = parse_ok("space m; var v = (a + b) * c");
    match value_of_first_var(&file) {
        Expr::Operation(op) => {
            assert_eq!(op.op, Operator::Mul);
            assert!(matches!(&*op.x, Expr::Paren(_)));
        }
        x => panic!("unexpected {x:?}"),
    }
}

#[test]
fn string_literal_value_is_verbatim() {
    let file = parse_ok("space m; var s = \"a\\x41b\"");
    match value_of_first_var(&file) {
        Expr::Lit(l) => {
            assert_eq!(l.value, "\"a\\x41b\"");
            assert_eq!(l.kind, LitKind::String);
            assert!(!l.bad);
        }
        x => panic!("unexpected {x:?}"),
    }
}

// =============================================================================
// parse_expr
// =============================================================================

#[test]
fn parse_expr_accepts_plain_expressions() {
    let x = parse_expr("a + b").unwrap();
    assert!(matches!(x, Expr::Operation(op) if op.op == Operator::Add));

    // a trailing newline only inserts a semicolon, which is tolerated
    assert!(parse_expr("a + b\n").is_ok());
}

#[test]
fn parse_expr_rejects_trailing_tokens() {
    assert!(parse_expr("a + b;").is_err());
    assert!(parse_expr("a + *").is_err());
    for c in ["!", ")", "]", "}", ";", ","] {
        assert!(parse_expr(&format!("a + b{c}x")).is_err(), "trailing {c}");
    }
}

// =============================================================================
// Error recovery
// =============================================================================

#[test]
fn bad_expression_does_not_abort_the_file() {
    let (file, diags) = parse_with_errors("space m\nvar a = )\nvar b = 2\n");
    let file = file.unwrap();
    assert!(diags.iter().any(|e| e.msg.contains("expected expression")), "{diags:?}");
    assert_eq!(file.decls.len(), 2);
    assert!(matches!(value_of_first_var(&file), Expr::Bad(_)));
    match &file.decls[1] {
        Decl::Var(d) => assert_eq!(d.name.value, "b"),
        d => panic!("unexpected {d:?}"),
    }
}

#[test]
fn bad_expression_in_function_recovers_at_statement_start() {
    let (file, diags) = parse_with_errors("space m\nfunc f() {\n\tx := )\n\treturn 1\n}\n");
    let file = file.unwrap();
    assert!(diags.iter().any(|e| e.msg.contains("expected expression")), "{diags:?}");
    let body = first_func_body(&file);
    assert!(matches!(body.stmts.last(), Some(Stmt::Return(_))));
}

#[test]
fn statement_errors_recover_at_statement_boundary() {
    let (file, diags) =
        parse_with_errors("space m\nfunc f() {\n\tx := 1 2\n\ty := 2\n}\n");
    let file = file.unwrap();
    assert!(diags.iter().any(|e| e.msg.contains("at end of statement")), "{diags:?}");
    let body = first_func_body(&file);
    assert_eq!(body.stmts.len(), 2);
}

#[test]
fn top_level_statement_is_diagnosed() {
    let (file, diags) = parse_with_errors("space m\nx := 1\nvar y int\n");
    let file = file.unwrap();
    assert!(
        diags.iter().any(|e| e.msg.contains("non-declaration statement outside function body")),
        "{diags:?}"
    );
    // recovery continues with the next declaration
    assert!(matches!(&file.decls[0], Decl::Var(d) if d.name.value == "y"));
}

#[test]
fn diagnostics_carry_positions_in_source_order() {
    let (_, diags) = parse_with_errors("space m\nvar a = $\nvar b = #\n");
    assert!(diags.len() >= 2);
    let mut prev = (0, 0);
    for e in &diags {
        let at = (e.pos.line(), e.pos.col());
        assert!(at >= prev, "out of order: {diags:?}");
        prev = at;
    }
}

// =============================================================================
// Line directives
// =============================================================================

#[test]
fn line_directive_rewrites_positions() {
    let src = "space m\n//line other.paw:10\nvar x int\n";
    let file = parse_ok(src);
    let pos = file.decls[0].pos();
    assert_eq!(pos.rel_filename(), "other.paw");
    assert_eq!(pos.rel_line(), 10);
    // physical position is retained
    assert_eq!(pos.line(), 3);
}

#[test]
fn line_directive_with_column() {
    let src = "space m\n/*line gen.paw:5:9*/var x int\n";
    let file = parse_ok(src);
    let pos = file.decls[0].pos();
    assert_eq!(pos.rel_filename(), "gen.paw");
    assert_eq!(pos.rel_line(), 5);
    assert_eq!(pos.rel_col(), 9);
}

#[test]
fn line_directive_empty_filename_reuses_previous() {
    let src = "space m\n//line one.paw:5\nvar x int\n//line :7\nvar y int\n";
    let file = parse_ok(src);
    assert_eq!(file.decls[0].pos().rel_filename(), "one.paw");
    let pos = file.decls[1].pos();
    assert_eq!(pos.rel_filename(), "one.paw");
    assert_eq!(pos.rel_line(), 7);
}

#[test]
fn line_directive_not_at_line_start_is_ignored() {
    let src = "space m\nvar x int //line other.paw:10\nvar y int\n";
    let file = parse_ok(src);
    assert_eq!(file.decls[1].pos().rel_filename(), "test.paw");
}

#[test]
fn invalid_line_directive_numbers_are_reported() {
    let (_, diags) = parse_with_errors("space m\n//line foo.paw:0\nvar x int\n");
    assert!(diags.iter().any(|e| e.msg.contains("invalid line number")), "{diags:?}");

    let (_, diags) = parse_with_errors("space m\n//line foo.paw:1:0\nvar x int\n");
    assert!(diags.iter().any(|e| e.msg.contains("invalid column number")), "{diags:?}");

    // a bad number leaves the base unchanged
    let (file, _) = parse_with_errors("space m\n//line foo.paw:0\nvar x int\n");
    assert_eq!(file.unwrap().decls[0].pos().rel_filename(), "test.paw");
}
