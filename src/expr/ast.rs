use super::Value;
use strum::IntoStaticStr;

/// One parsed sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Constant(Value),
    Name(String),
    Attribute {
        value: Box<Self>,
        attr: String,
    },
    Subscript {
        value: Box<Self>,
        index: Box<Self>,
    },
    Call {
        func: Box<Self>,
        args: Vec<Self>,
        keywords: Vec<(String, Self)>,
    },

    /// `left op1 right1 op2 right2 ...`
    Compare {
        left: Box<Self>,
        comparisons: Vec<(CompareOp, Self)>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Self>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Self>,
    },
    BinOp {
        left: Box<Self>,
        op: BinaryOp,
        right: Box<Self>,
    },
    List(Vec<Self>),
    Tuple(Vec<Self>),
    Set(Vec<Self>),
    Dict(Vec<(Self, Self)>),
    IfExp {
        test: Box<Self>,
        body: Box<Self>,
        orelse: Box<Self>,
    },

    /// List comprehension or generator expression; both produce a list.
    Comprehension {
        element: Box<Self>,
        generators: Vec<Generator>,
    },

    /// Valid syntax outside the allow-list, kept so evaluation can name it.
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Generator {
    pub target: Node,
    pub iter: Node,
    pub conditions: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub(crate) enum UnaryOp {
    Not,
    USub,
    UAdd,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    FloorDiv,
    Pow,
    MatMult,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}
