//! Expression AST and the closed set of builtin functions.
//!
//! Function names are resolved against [`Builtin`] at parse time so a rule
//! file calling an unknown function is rejected before any instrument is
//! evaluated, instead of failing mid-batch.

use std::fmt;

/// Builtin functions callable from a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Ref,
    Ma,
    Ema,
    Sma,
    Llv,
    Hhv,
    Inblock,
    Namelike,
}

impl Builtin {
    /// Resolve an (uppercased) function name. `None` means unknown function.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "REF" => Some(Builtin::Ref),
            "MA" => Some(Builtin::Ma),
            "EMA" => Some(Builtin::Ema),
            "SMA" => Some(Builtin::Sma),
            "LLV" => Some(Builtin::Llv),
            "HHV" => Some(Builtin::Hhv),
            "INBLOCK" => Some(Builtin::Inblock),
            "NAMELIKE" => Some(Builtin::Namelike),
            _ => None,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Builtin::Ref | Builtin::Ma | Builtin::Ema | Builtin::Llv | Builtin::Hhv => 2,
            Builtin::Sma => 3,
            Builtin::Inblock | Builtin::Namelike => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Ref => "REF",
            Builtin::Ma => "MA",
            Builtin::Ema => "EMA",
            Builtin::Sma => "SMA",
            Builtin::Llv => "LLV",
            Builtin::Hhv => "HHV",
            Builtin::Inblock => "INBLOCK",
            Builtin::Namelike => "NAMELIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Ident(String),
    Call(Builtin, Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Str(s) => write!(f, "'{s}'"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Call(builtin, args) => {
                write!(f, "{}(", builtin.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Neg(inner) => write!(f, "-({inner})"),
            Expr::Not(inner) => write!(f, "NOT ({inner})"),
            Expr::Binary(op, left, right) => {
                let sym = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    BinOp::And => "AND",
                    BinOp::Or => "OR",
                };
                write!(f, "({left} {sym} {right})")
            }
            Expr::Compare(op, left, right) => {
                let sym = match op {
                    CmpOp::Lt => "<",
                    CmpOp::Gt => ">",
                    CmpOp::Le => "<=",
                    CmpOp::Ge => ">=",
                    CmpOp::Eq => "==",
                    CmpOp::Ne => "!=",
                };
                write!(f, "({left} {sym} {right})")
            }
        }
    }
}
