use notify_schemas::Value;

#[derive(Debug, Clone)]
pub enum Expr {
    Lit(Value),
    /// A dotted path such as `row.email` or `rule_results.debe_notificar`,
    /// or a bare name with no root binding (resolves to an UnknownName error).
    Path(String),
    Call(String, Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy)]
pub enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}
