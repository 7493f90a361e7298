use crate::ast::{Expr, Node, PipelineElement, ScriptTree, Statement};

/// How one top-level statement relates to the last-result variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    Assignment,
    Declaration,
    IncrementDecrement,
    /// A variable, possibly behind index / member / method access.
    VariableRead,
    /// Anything that may produce a fresh result.
    Producing,
}

impl StatementClass {
    pub fn is_exempt(self) -> bool {
        !matches!(self, StatementClass::Producing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    Unparsable,
    Empty,
    /// Every statement was an assignment, declaration, counter bump or variable read.
    BookkeepingOnly,
    /// The command itself reads the last-result variable.
    ReadsCaptureVariable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDecision {
    Overwrite,
    Keep(KeepReason),
}

impl CaptureDecision {
    pub fn is_overwrite(self) -> bool {
        matches!(self, CaptureDecision::Overwrite)
    }
}

pub fn classify_statement(statement: &Statement) -> StatementClass {
    match statement {
        Statement::Assignment { .. } => StatementClass::Assignment,
        Statement::FunctionDefinition { .. } => StatementClass::Declaration,
        Statement::Pipeline(elements) => match elements.as_slice() {
            [PipelineElement::Expression(expr)] => classify_expression(expr),
            _ => StatementClass::Producing,
        },
        Statement::Control { .. } => StatementClass::Producing,
    }
}

fn classify_expression(expr: &Expr) -> StatementClass {
    if let Expr::Unary { op, .. } = expr {
        return if op.is_increment_or_decrement() {
            StatementClass::IncrementDecrement
        } else {
            StatementClass::Producing
        };
    }

    let mut root = expr;
    loop {
        match root {
            Expr::Index { target, .. } | Expr::Member { target, .. } => root = target.as_ref(),
            Expr::Variable(_) => return StatementClass::VariableRead,
            _ => return StatementClass::Producing,
        }
    }
}

/// True when any node reads `name` directly or indexes into it (case-insensitive).
pub fn references_variable(tree: &ScriptTree, name: &str) -> bool {
    tree.nodes().any(|node| match node {
        Node::Expr(Expr::Variable(var)) => var.eq_ignore_ascii_case(name),
        Node::Expr(Expr::Index { target, .. }) => {
            matches!(target.as_ref(), Expr::Variable(var) if var.eq_ignore_ascii_case(name))
        }
        _ => false,
    })
}

/// Decide whether the command that produced `tree` may overwrite the
/// last-result variable `capture_variable`.
pub fn decide(tree: Option<&ScriptTree>, capture_variable: &str) -> CaptureDecision {
    let tree = match tree {
        Some(tree) => tree,
        None => return CaptureDecision::Keep(KeepReason::Unparsable),
    };
    if tree.is_empty() {
        return CaptureDecision::Keep(KeepReason::Empty);
    }

    let all_exempt = tree
        .statements
        .iter()
        .all(|stmt| classify_statement(stmt).is_exempt());
    if all_exempt {
        return CaptureDecision::Keep(KeepReason::BookkeepingOnly);
    }

    if references_variable(tree, capture_variable) {
        return CaptureDecision::Keep(KeepReason::ReadsCaptureVariable);
    }
    CaptureDecision::Overwrite
}

pub fn should_overwrite_last_result(tree: Option<&ScriptTree>, capture_variable: &str) -> bool {
    let decision = decide(tree, capture_variable);
    tracing::trace!("last-result decision: {:?}", decision);
    decision.is_overwrite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp, ControlKeyword, UnaryOp};

    const CAPTURE: &str = "__";

    fn tree(statements: Vec<Statement>) -> ScriptTree {
        ScriptTree::new(statements)
    }

    fn get_process() -> Statement {
        Statement::command("Get-Process", vec![])
    }

    #[test]
    fn test_unparsable_keeps_value() {
        assert!(!should_overwrite_last_result(None, CAPTURE));
        assert_eq!(decide(None, CAPTURE), CaptureDecision::Keep(KeepReason::Unparsable));
    }

    #[test]
    fn test_empty_keeps_value() {
        assert_eq!(
            decide(Some(&tree(vec![])), CAPTURE),
            CaptureDecision::Keep(KeepReason::Empty)
        );
    }

    #[test]
    fn test_bookkeeping_statements_keep_value() {
        // $x = 1; $x += 1; $x; $x++; function f {}
        let t = tree(vec![
            Statement::assign(Expr::var("x"), Statement::expr(Expr::constant("1"))),
            Statement::compound_assign(
                Expr::var("x"),
                AssignOp::Add,
                Statement::expr(Expr::constant("1")),
            ),
            Statement::expr(Expr::var("x")),
            Statement::expr(Expr::unary(UnaryOp::PostIncrement, Expr::var("x"))),
            Statement::function("f", vec![get_process()]),
        ]);
        assert_eq!(
            decide(Some(&t), CAPTURE),
            CaptureDecision::Keep(KeepReason::BookkeepingOnly)
        );
    }

    #[test]
    fn test_each_bookkeeping_statement_alone_keeps_value() {
        let statements = vec![
            Statement::assign(Expr::var("x"), get_process()),
            Statement::compound_assign(
                Expr::var("x"),
                AssignOp::Remainder,
                Statement::expr(Expr::constant("3")),
            ),
            Statement::expr(Expr::var("x")),
            Statement::expr(Expr::unary(UnaryOp::PreDecrement, Expr::var("x"))),
            Statement::function("Get-Thing", vec![]),
        ];
        for stmt in statements {
            assert!(
                !should_overwrite_last_result(Some(&tree(vec![stmt.clone()])), CAPTURE),
                "should keep for {:?}",
                stmt
            );
        }
    }

    #[test]
    fn test_member_and_index_chains_resolve_to_variable() {
        // $x.Items[0].Name ; $x.ToString()
        let chained = Expr::member(
            Expr::index(Expr::member(Expr::var("x"), "Items"), Expr::constant("0")),
            "Name",
        );
        assert_eq!(
            classify_statement(&Statement::expr(chained)),
            StatementClass::VariableRead
        );
        let call = Expr::invoke(Expr::var("x"), "ToString", vec![]);
        assert_eq!(
            classify_statement(&Statement::expr(call)),
            StatementClass::VariableRead
        );
        let paren_root = Expr::member(Expr::Paren(Box::new(get_process())), "Count");
        assert_eq!(
            classify_statement(&Statement::expr(paren_root)),
            StatementClass::Producing
        );
    }

    #[test]
    fn test_other_unary_is_producing() {
        let not = Statement::expr(Expr::unary(UnaryOp::Not, Expr::var("x")));
        assert_eq!(classify_statement(&not), StatementClass::Producing);
    }

    #[test]
    fn test_command_overwrites() {
        assert!(should_overwrite_last_result(Some(&tree(vec![get_process()])), CAPTURE));
    }

    #[test]
    fn test_mixed_statements_overwrite() {
        let t = tree(vec![
            Statement::assign(Expr::var("x"), Statement::expr(Expr::constant("1"))),
            get_process(),
        ]);
        assert!(should_overwrite_last_result(Some(&t), CAPTURE));
    }

    #[test]
    fn test_multi_element_pipeline_of_variable_is_producing() {
        // $x | Sort-Object
        let stmt = Statement::pipeline(vec![
            PipelineElement::Expression(Expr::var("x")),
            PipelineElement::command("Sort-Object", vec![]),
        ]);
        assert_eq!(classify_statement(&stmt), StatementClass::Producing);
    }

    #[test]
    fn test_capture_variable_reference_keeps_value() {
        // $__ | Select-Object -First 1
        let t = tree(vec![Statement::pipeline(vec![
            PipelineElement::Expression(Expr::var("__")),
            PipelineElement::command(
                "Select-Object",
                vec![Expr::Parameter("First".into()), Expr::constant("1")],
            ),
        ])]);
        assert_eq!(
            decide(Some(&t), CAPTURE),
            CaptureDecision::Keep(KeepReason::ReadsCaptureVariable)
        );
    }

    #[test]
    fn test_capture_variable_in_other_statement_keeps_value() {
        // Get-Process; $y = $__[0]
        let t = tree(vec![
            get_process(),
            Statement::assign(
                Expr::var("y"),
                Statement::expr(Expr::index(Expr::var("__"), Expr::constant("0"))),
            ),
        ]);
        assert!(!should_overwrite_last_result(Some(&t), CAPTURE));
    }

    #[test]
    fn test_capture_variable_match_is_case_insensitive() {
        let t = tree(vec![Statement::command(
            "Write-Output",
            vec![Expr::var("LastResult")],
        )]);
        assert!(!should_overwrite_last_result(Some(&t), "lastresult"));
        assert!(should_overwrite_last_result(Some(&t), "other"));
    }

    #[test]
    fn test_capture_variable_inside_nested_script_block_keeps_value() {
        // foreach ($i in 1..3) { Get-Item $__ }
        let t = tree(vec![Statement::Control {
            keyword: ControlKeyword::Foreach,
            conditions: vec![Statement::expr(Expr::var("i"))],
            bodies: vec![tree(vec![Statement::command(
                "Get-Item",
                vec![Expr::var("__")],
            )])],
        }]);
        assert!(!should_overwrite_last_result(Some(&t), CAPTURE));
    }

    #[test]
    fn test_similar_variable_name_does_not_block() {
        let t = tree(vec![Statement::command("Get-Item", vec![Expr::var("___")])]);
        assert!(should_overwrite_last_result(Some(&t), CAPTURE));
    }
}
