use std::time::Duration;

use super::parse_slq;
use crate::ast::*;

// ---------------------------------------------------------------------------
// Full queries
// ---------------------------------------------------------------------------

#[test]
fn minimal_query() {
    let q = parse_slq(
        "from acme.ops.live.foo \
         window slice 10 seconds \
         aggregate count() as n \
         append n \
         to bar",
    )
    .unwrap();

    assert_eq!(q.from, "acme.ops.live.foo");
    assert!(q.group_by.is_empty());
    assert!(q.ingress_where.is_none());
    assert_eq!(
        q.window,
        WindowClause::Slice {
            width: SliceWidth::Time(Duration::from_secs(10)),
            based_on: None,
        },
    );
    assert_eq!(q.aggregations.len(), 1);
    assert_eq!(q.aggregations[0].func, AggFunc::Count);
    assert_eq!(q.aggregations[0].input, None);
    assert_eq!(q.aggregations[0].alias, "n");
    assert_eq!(q.append, vec!["n"]);
    assert_eq!(q.to, "bar");
}

#[test]
fn full_clause_order() {
    let q = parse_slq(
        "from acme.ops.live.foo \
         group by g, h \
         where x > 5 and not (y == 2) \
         window slice 10 seconds based on t \
         aggregate avg(x) as a, sum(x) as s, count() as n, first(t) as begin, last(t) as e \
         where n > 1 \
         append a, s, n, e \
         where a >= 0 \
         to bar",
    )
    .unwrap();

    assert_eq!(q.group_by, vec!["g", "h"]);
    assert!(q.ingress_where.is_some());
    assert_eq!(
        q.window,
        WindowClause::Slice {
            width: SliceWidth::Time(Duration::from_secs(10)),
            based_on: Some("t".into()),
        },
    );
    assert_eq!(q.aggregations.len(), 5);
    assert_eq!(q.aggregations[3].func, AggFunc::First);
    assert_eq!(q.aggregations[3].input.as_deref(), Some("t"));
    assert!(q.aggregate_where.is_some());
    assert_eq!(q.append, vec!["a", "s", "n", "e"]);
    assert!(q.project_where.is_some());
}

#[test]
fn comments_are_skipped() {
    let q = parse_slq(
        "# leading comment\n\
         from acme.ops.live.foo # trailing\n\
         window slice 5 rows\n\
         aggregate sum(x) as s\n\
         append s\n\
         to bar\n",
    )
    .unwrap();
    assert_eq!(
        q.window,
        WindowClause::Slice {
            width: SliceWidth::Rows(5),
            based_on: None,
        },
    );
}

// ---------------------------------------------------------------------------
// Window variants
// ---------------------------------------------------------------------------

#[test]
fn slice_rows_based_on() {
    let q = parse_slq(
        "from f window slice 100 rows based on seq \
         aggregate sum(x) as s append s to bar",
    )
    .unwrap();
    assert_eq!(
        q.window,
        WindowClause::Slice {
            width: SliceWidth::Rows(100),
            based_on: Some("seq".into()),
        },
    );
}

#[test]
fn slide_window_parses() {
    let q = parse_slq(
        "from f window slide 1 minutes advance every 10 seconds \
         aggregate sum(x) as s append s to bar",
    )
    .unwrap();
    assert_eq!(
        q.window,
        WindowClause::Slide {
            width: Duration::from_secs(60),
            advance: Duration::from_secs(10),
        },
    );
}

#[test]
fn session_window_inclusive() {
    let q = parse_slq(
        "from f window session begin when action == \"in\" end when action == \"out\" \
         inclusive expire after 30 seconds \
         aggregate count() as n append n to bar",
    )
    .unwrap();
    match q.window {
        WindowClause::Session {
            open,
            close,
            inclusive,
            expire_after,
        } => {
            assert!(inclusive);
            assert_eq!(expire_after, Duration::from_secs(30));
            assert_eq!(
                open,
                Expr::bin(
                    BinOp::Eq,
                    Expr::Field("action".into()),
                    Expr::Str("in".into()),
                ),
            );
            assert_eq!(
                close,
                Expr::bin(
                    BinOp::Eq,
                    Expr::Field("action".into()),
                    Expr::Str("out".into()),
                ),
            );
        }
        other => panic!("expected session window, got {other:?}"),
    }
}

#[test]
fn session_window_exclusive() {
    let q = parse_slq(
        "from f window session begin when a == 1 end when a == 2 \
         exclusive expire after 5 minutes \
         aggregate count() as n append n to bar",
    )
    .unwrap();
    assert!(matches!(
        q.window,
        WindowClause::Session {
            inclusive: false,
            ..
        },
    ));
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn parse_pred(pred: &str) -> Expr {
    let q = parse_slq(&format!(
        "from f where {pred} window slice 1 seconds \
         aggregate count() as n append n to bar",
    ))
    .unwrap();
    q.ingress_where.unwrap()
}

#[test]
fn precedence_or_and_not() {
    // a == 1 or b == 2 and not c == 3  parses as  a==1 or (b==2 and (not c==3))
    let e = parse_pred("a == 1 or b == 2 and not c == 3");
    let Expr::Bin { op: BinOp::Or, right, .. } = e else {
        panic!("top must be or");
    };
    let Expr::Bin { op: BinOp::And, right, .. } = *right else {
        panic!("right of or must be and");
    };
    assert!(matches!(*right, Expr::Not(_)));
}

#[test]
fn arithmetic_left_associative() {
    // 1 - 2 - 3 parses as (1 - 2) - 3
    let e = parse_pred("x == 1 - 2 - 3");
    let Expr::Bin { right, .. } = e else { panic!() };
    let Expr::Bin { op: BinOp::Sub, left, right } = *right else {
        panic!("expected subtraction");
    };
    assert_eq!(*right, Expr::Int(3));
    assert!(matches!(*left, Expr::Bin { op: BinOp::Sub, .. }));
}

#[test]
fn mul_binds_tighter_than_add() {
    let e = parse_pred("x == 1 + 2 * 3");
    let Expr::Bin { right, .. } = e else { panic!() };
    let Expr::Bin { op: BinOp::Add, right, .. } = *right else {
        panic!("expected addition at top");
    };
    assert!(matches!(*right, Expr::Bin { op: BinOp::Mul, .. }));
}

#[test]
fn timestamp_and_duration_literals() {
    let e = parse_pred("t >= '2024-01-24T17:00:00-08:00' and t - '2024-01-24T16:00:00-08:00' < 90 minutes");
    let Expr::Bin { op: BinOp::And, left, right } = e else {
        panic!("top must be and");
    };
    let Expr::Bin { op: BinOp::Ge, right: lit, .. } = *left else {
        panic!("left must be >=");
    };
    assert_eq!(*lit, Expr::TimeLit("2024-01-24T17:00:00-08:00".into()));
    let Expr::Bin { op: BinOp::Lt, right: dur, .. } = *right else {
        panic!("right must be <");
    };
    assert_eq!(*dur, Expr::Dur(Duration::from_secs(90 * 60)));
}

#[test]
fn modulo_alignment_expression() {
    let e = parse_pred("t % 10 seconds == 0");
    let Expr::Bin { op: BinOp::Eq, left, .. } = e else {
        panic!("top must be ==");
    };
    assert!(matches!(*left, Expr::Bin { op: BinOp::Mod, .. }));
}

#[test]
fn parenthesized_expression() {
    let e = parse_pred("(x + y) * 2 == 10");
    let Expr::Bin { op: BinOp::Eq, left, .. } = e else { panic!() };
    let Expr::Bin { op: BinOp::Mul, left, .. } = *left else {
        panic!("expected multiplication");
    };
    assert!(matches!(*left, Expr::Bin { op: BinOp::Add, .. }));
}

#[test]
fn negative_literals() {
    let e = parse_pred("x > -5 and y < -1.5");
    let Expr::Bin { op: BinOp::And, left, right } = e else { panic!() };
    let Expr::Bin { right: l, .. } = *left else { panic!() };
    assert_eq!(*l, Expr::Int(-5));
    let Expr::Bin { right: r, .. } = *right else { panic!() };
    assert_eq!(*r, Expr::Float(-1.5));
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[test]
fn missing_window_clause_fails() {
    assert!(parse_slq("from f aggregate count() as n append n to bar").is_err());
}

#[test]
fn clause_out_of_order_fails() {
    assert!(
        parse_slq(
            "from f aggregate count() as n window slice 1 seconds append n to bar",
        )
        .is_err()
    );
}

#[test]
fn empty_aggregate_list_fails() {
    assert!(parse_slq("from f window slice 1 seconds aggregate append n to bar").is_err());
}

#[test]
fn missing_alias_fails() {
    assert!(parse_slq("from f window slice 1 seconds aggregate sum(x) append n to bar").is_err());
}

#[test]
fn unterminated_string_fails() {
    assert!(
        parse_slq(
            "from f where a == \"oops window slice 1 seconds aggregate count() as n append n to bar",
        )
        .is_err()
    );
}

#[test]
fn trailing_garbage_fails() {
    assert!(
        parse_slq(
            "from f window slice 1 seconds aggregate count() as n append n to bar extra",
        )
        .is_err()
    );
}
