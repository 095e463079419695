use std::fmt::{self, Display, Formatter};

use super::{BinaryOp, Function, Inst, InstNode, Intrinsic, Module, Operand, Terminator, Ty, Value};

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.bits())
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(value) => value.fmt(f),
            Operand::Const(c) => c.fmt(f),
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::URem => "urem",
        })
    }
}

impl Display for Inst {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Inst::FillTape { byte } => write!(f, "fill_tape i8 {}", byte),
            Inst::LoadCursor { dst } => write!(f, "{} = load_cursor", dst),
            Inst::StoreCursor { src } => write!(f, "store_cursor i64 {}", src),
            Inst::LoadCell { dst, index } => write!(f, "{} = load_cell i8, {}", dst, index),
            Inst::StoreCell { index, src } => write!(f, "store_cell i8 {}, {}", src, index),
            Inst::Binary {
                dst,
                op,
                ty,
                lhs,
                rhs,
            } => write!(f, "{} = {} {} {}, {}", dst, op, ty, lhs, rhs),
            Inst::CmpEq { dst, ty, lhs, rhs } => {
                write!(f, "{} = icmp eq {} {}, {}", dst, ty, lhs, rhs)
            }
            Inst::ZExt { dst, src, to } => write!(f, "{} = zext {} to {}", dst, src, to),
            Inst::Trunc { dst, src, to } => write!(f, "{} = trunc {} to {}", dst, src, to),
            Inst::Call { dst, callee, args } => {
                if let Some(dst) = dst {
                    write!(f, "{} = ", dst)?;
                }
                write!(f, "call {} @{}(", callee.returns(), callee.symbol())?;
                for (i, (arg, ty)) in args.iter().zip(callee.params()).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", ty, arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

struct NodeWithLoc<'a>(&'a InstNode);

impl Display for NodeWithLoc<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = self.0.inst.to_string();
        match self.0.loc {
            Some(loc) => write!(
                f,
                "{:<40} ; {}:{} '{}'",
                text, loc.position.line, loc.position.column, loc.instruction
            ),
            None => f.write_str(&text),
        }
    }
}

fn fmt_terminator(function: &Function, terminator: &Terminator, f: &mut Formatter<'_>) -> fmt::Result {
    let name = |id: super::BlockId| {
        function
            .blocks
            .get(id.index())
            .map(|block| block.name.as_str())
            .unwrap_or("<invalid>")
    };

    match terminator {
        Terminator::Jump(target) => write!(f, "br label %{}", name(*target)),
        Terminator::Branch {
            cond,
            then_block,
            else_block,
        } => write!(
            f,
            "br i1 {}, label %{}, label %{}",
            cond,
            name(*then_block),
            name(*else_block)
        ),
        Terminator::Return(code) => write!(f, "ret i32 {}", code),
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "define i32 @{}() {{", self.name)?;
        for block in self.blocks.iter() {
            writeln!(f, "{}:", block.name)?;
            for node in block.insts.iter() {
                writeln!(f, "  {}", NodeWithLoc(node))?;
            }
            match &block.terminator {
                Some(terminator) => {
                    f.write_str("  ")?;
                    fmt_terminator(self, terminator, f)?;
                    writeln!(f)?;
                }
                None => writeln!(f, "  ; <no terminator>")?,
            }
        }
        writeln!(f, "}}")
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module '{}'", self.name)?;
        if let Some(debug_info) = &self.debug_info {
            writeln!(f, "; source_filename = \"{}\"", debug_info.file_name)?;
        }
        writeln!(f, "@tape = internal global [{} x i8] zeroinitializer", self.tape_size)?;
        writeln!(f, "@cursor = internal global i64 0")?;
        writeln!(f)?;
        for intrinsic in [Intrinsic::PutByte, Intrinsic::GetByte] {
            let params: Vec<String> = intrinsic.params().iter().map(Ty::to_string).collect();
            writeln!(
                f,
                "declare {} @{}({})",
                intrinsic.returns(),
                intrinsic.symbol(),
                params.join(", ")
            )?;
        }
        writeln!(f)?;
        self.main.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{BinaryOp, Builder, Intrinsic, Operand, Terminator, Ty};

    #[test]
    fn prints_llvm_like_listing() {
        let mut builder = Builder::new("main");
        let cursor = builder.load_cursor().unwrap();
        let cell = builder.load_cell(cursor).unwrap();
        let sum = builder.binary(BinaryOp::Add, Ty::I8, cell, Operand::Const(1)).unwrap();
        let wide = builder.zext(sum, Ty::I32).unwrap();
        builder.call_void(Intrinsic::PutByte, vec![wide]).unwrap();
        builder.terminate(Terminator::Return(0)).unwrap();
        let text = builder.finish().to_string();

        assert!(text.starts_with("define i32 @main() {\nentry:\n"));
        assert!(text.contains("  %2 = add i8 %1, 1\n"));
        assert!(text.contains("  call i32 @putchar(i32 %3)\n"));
        assert!(text.ends_with("  ret i32 0\n}\n"));
    }
}
