// Intermediate representation
// S-expression nodes between the global context and assembly

use num_bigint::BigInt;
use ratel_parser::Span;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrValue {
    Int(BigInt),
    Op(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    pub value: IrValue,
    pub args: Vec<IrNode>,
    /// Source position of the statement this node was lowered from
    pub pos: Option<Span>,
}

/// Line width before a node is broken over several lines
const LINE_WIDTH: usize = 80;

impl IrNode {
    pub fn op(name: &str, args: Vec<IrNode>) -> Self {
        Self {
            value: IrValue::Op(name.to_string()),
            args,
            pos: None,
        }
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Self {
            value: IrValue::Int(value.into()),
            args: Vec::new(),
            pos: None,
        }
    }

    pub fn seq(args: Vec<IrNode>) -> Self {
        Self::op("seq", args)
    }

    pub fn pass() -> Self {
        Self::op("pass", Vec::new())
    }

    pub fn with_pos(mut self, span: Span) -> Self {
        if !span.is_synthesized() {
            self.pos = Some(span);
        }
        self
    }

    pub fn op_name(&self) -> Option<&str> {
        match &self.value {
            IrValue::Op(name) => Some(name),
            IrValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.value {
            IrValue::Int(value) => Some(value),
            IrValue::Op(_) => None,
        }
    }

    pub fn is_op(&self, name: &str) -> bool {
        self.op_name() == Some(name)
    }

    /// Every node in the tree, depth first
    pub fn walk(&self) -> Box<dyn Iterator<Item = &IrNode> + '_> {
        Box::new(std::iter::once(self).chain(self.args.iter().flat_map(|arg| arg.walk())))
    }

    fn flat(&self) -> String {
        match &self.value {
            IrValue::Int(value) => value.to_string(),
            IrValue::Op(name) if self.args.is_empty() => name.clone(),
            IrValue::Op(name) => {
                let args: Vec<String> = self.args.iter().map(IrNode::flat).collect();
                format!("({} {})", name, args.join(" "))
            }
        }
    }

    fn write_indented(&self, f: &mut Formatter<'_>, indent: usize) -> fmt::Result {
        let flat = self.flat();
        if flat.len() + indent <= LINE_WIDTH || self.args.is_empty() {
            return f.write_str(&flat);
        }
        let name = self.op_name().unwrap_or_default();
        write!(f, "({}", name)?;
        for arg in &self.args {
            write!(f, "\n{:width$}", "", width = indent + 2)?;
            arg.write_indented(f, indent + 2)?;
        }
        f.write_str(")")
    }
}

impl Display for IrNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
