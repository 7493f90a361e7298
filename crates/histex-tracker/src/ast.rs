//! Statement tree of one executed command, as produced by the host's parser.
//!
//! Only the shapes the capture heuristic needs to tell apart are modelled;
//! everything else parses into the nearest general variant.

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTree {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Filter,
    Workflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKeyword {
    If,
    Foreach,
    For,
    While,
    DoWhile,
    DoUntil,
    Switch,
    Try,
    Trap,
    Return,
    Throw,
    Break,
    Continue,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: Expr,
        op: AssignOp,
        value: Box<Statement>,
    },
    FunctionDefinition {
        name: String,
        kind: FunctionKind,
        body: ScriptTree,
    },
    Pipeline(Vec<PipelineElement>),
    /// Any keyword statement; `conditions` hold loop headers, switch subjects
    /// and the operand of return/throw, `bodies` every nested block.
    Control {
        keyword: ControlKeyword,
        conditions: Vec<Statement>,
        bodies: Vec<ScriptTree>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineElement {
    Command { name: String, arguments: Vec<Expr> },
    Expression(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    Not,
    Negate,
    Join,
    Split,
}

impl UnaryOp {
    pub fn is_increment_or_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement
                | UnaryOp::PreDecrement
                | UnaryOp::PostIncrement
                | UnaryOp::PostDecrement
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Variable reference by name, without sigil (`global:foo` keeps its scope).
    Variable(String),
    Constant(String),
    /// Parameter name on a command line, without the leading dash.
    Parameter(String),
    ExpandableString {
        text: String,
        parts: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// Property access, or a method call when `arguments` is `Some`.
    Member {
        target: Box<Expr>,
        member: String,
        arguments: Option<Vec<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Convert {
        type_name: String,
        operand: Box<Expr>,
    },
    Array(Vec<Expr>),
    Hashtable(Vec<(Expr, Statement)>),
    Paren(Box<Statement>),
    SubExpression(Vec<Statement>),
    ScriptBlock(ScriptTree),
}

impl ScriptTree {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Depth-first walk over every statement and expression in the tree,
    /// nested script blocks included.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            stack: self.statements.iter().rev().map(Node::Statement).collect(),
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes().filter_map(|node| match node {
            Node::Expr(Expr::Variable(name)) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl Statement {
    pub fn assign(target: Expr, value: Statement) -> Self {
        Statement::Assignment {
            target,
            op: AssignOp::Assign,
            value: Box::new(value),
        }
    }

    pub fn compound_assign(target: Expr, op: AssignOp, value: Statement) -> Self {
        Statement::Assignment {
            target,
            op,
            value: Box::new(value),
        }
    }

    pub fn function(name: &str, body: Vec<Statement>) -> Self {
        Statement::FunctionDefinition {
            name: name.to_string(),
            kind: FunctionKind::Function,
            body: ScriptTree::new(body),
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Statement::Pipeline(vec![PipelineElement::Expression(expr)])
    }

    pub fn command(name: &str, arguments: Vec<Expr>) -> Self {
        Statement::Pipeline(vec![PipelineElement::Command {
            name: name.to_string(),
            arguments,
        }])
    }

    pub fn pipeline(elements: Vec<PipelineElement>) -> Self {
        Statement::Pipeline(elements)
    }
}

impl PipelineElement {
    pub fn command(name: &str, arguments: Vec<Expr>) -> Self {
        PipelineElement::Command {
            name: name.to_string(),
            arguments,
        }
    }
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    pub fn constant(text: &str) -> Self {
        Expr::Constant(text.to_string())
    }

    pub fn index(target: Expr, index: Expr) -> Self {
        Expr::Index {
            target: Box::new(target),
            index: Box::new(index),
        }
    }

    pub fn member(target: Expr, member: &str) -> Self {
        Expr::Member {
            target: Box::new(target),
            member: member.to_string(),
            arguments: None,
        }
    }

    pub fn invoke(target: Expr, member: &str, arguments: Vec<Expr>) -> Self {
        Expr::Member {
            target: Box::new(target),
            member: member.to_string(),
            arguments: Some(arguments),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: &str, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op: op.to_string(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn script_block(statements: Vec<Statement>) -> Self {
        Expr::ScriptBlock(ScriptTree::new(statements))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Statement(&'a Statement),
    Expr(&'a Expr),
}

pub struct Nodes<'a> {
    stack: Vec<Node<'a>>,
}

impl<'a> Nodes<'a> {
    fn push_tree(&mut self, tree: &'a ScriptTree) {
        self.push_statements(&tree.statements);
    }

    fn push_statements(&mut self, statements: &'a [Statement]) {
        self.stack
            .extend(statements.iter().rev().map(Node::Statement));
    }

    fn push_exprs(&mut self, exprs: &'a [Expr]) {
        self.stack.extend(exprs.iter().rev().map(Node::Expr));
    }

    fn push_children(&mut self, node: Node<'a>) {
        // Children are pushed in reverse so they pop in source order.
        match node {
            Node::Statement(stmt) => match stmt {
                Statement::Assignment { target, value, .. } => {
                    self.stack.push(Node::Statement(value));
                    self.stack.push(Node::Expr(target));
                }
                Statement::FunctionDefinition { body, .. } => self.push_tree(body),
                Statement::Pipeline(elements) => {
                    for element in elements.iter().rev() {
                        match element {
                            PipelineElement::Command { arguments, .. } => {
                                self.push_exprs(arguments)
                            }
                            PipelineElement::Expression(expr) => self.stack.push(Node::Expr(expr)),
                        }
                    }
                }
                Statement::Control {
                    conditions, bodies, ..
                } => {
                    for body in bodies.iter().rev() {
                        self.push_tree(body);
                    }
                    self.push_statements(conditions);
                }
            },
            Node::Expr(expr) => match expr {
                Expr::Variable(_) | Expr::Constant(_) | Expr::Parameter(_) => {}
                Expr::ExpandableString { parts, .. } => self.push_exprs(parts),
                Expr::Index { target, index } => {
                    self.stack.push(Node::Expr(index));
                    self.stack.push(Node::Expr(target));
                }
                Expr::Member {
                    target, arguments, ..
                } => {
                    if let Some(arguments) = arguments {
                        self.push_exprs(arguments);
                    }
                    self.stack.push(Node::Expr(target));
                }
                Expr::Unary { operand, .. } | Expr::Convert { operand, .. } => {
                    self.stack.push(Node::Expr(operand))
                }
                Expr::Binary { left, right, .. } => {
                    self.stack.push(Node::Expr(right));
                    self.stack.push(Node::Expr(left));
                }
                Expr::Array(items) => self.push_exprs(items),
                Expr::Hashtable(pairs) => {
                    for (key, value) in pairs.iter().rev() {
                        self.stack.push(Node::Statement(value));
                        self.stack.push(Node::Expr(key));
                    }
                }
                Expr::Paren(stmt) => self.stack.push(Node::Statement(stmt)),
                Expr::SubExpression(statements) => self.push_statements(statements),
                Expr::ScriptBlock(tree) => self.push_tree(tree),
            },
        }
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        let node = self.stack.pop()?;
        self.push_children(node);
        Some(node)
    }
}
