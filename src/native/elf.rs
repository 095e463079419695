use std::collections::HashMap;

use log::debug;
use object::{
    elf,
    write::{self, Object, StandardSection, Symbol as ObjectSymbol, SymbolId, SymbolSection},
    Architecture, BinaryFormat, Endianness, RelocationFlags, SectionKind, SymbolFlags, SymbolKind,
    SymbolScope,
};

use crate::backend::BackendError;

use super::x86_64::{MachineCode, RelocationKind, Symbol};

fn symbol(name: &str, kind: SymbolKind, scope: SymbolScope) -> ObjectSymbol {
    ObjectSymbol {
        name: name.as_bytes().to_vec(),
        value: 0,
        size: 0,
        kind,
        scope,
        weak: false,
        section: SymbolSection::Undefined,
        flags: SymbolFlags::None,
    }
}

/// Wraps the code in an ELF64 relocatable object.
///
/// `main` is global in `.text`, the tape is a local zero initialized `.bss` symbol and
/// the IO functions are left undefined for the C library to provide.
pub fn write_object(code: &MachineCode) -> Result<Vec<u8>, BackendError> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);

    let text = obj.section_id(StandardSection::Text);
    let main = obj.add_symbol(symbol("main", SymbolKind::Text, SymbolScope::Dynamic));
    let main_offset = obj.add_symbol_data(main, text, &code.text, 16);

    let bss = obj.section_id(StandardSection::UninitializedData);
    let tape = obj.add_symbol(symbol("tape", SymbolKind::Data, SymbolScope::Compilation));
    obj.add_symbol_bss(tape, bss, code.tape_size as u64, 16);

    // no executable stack
    obj.add_section(vec![], b".note.GNU-stack".to_vec(), SectionKind::Note);

    let mut externals: HashMap<&'static str, SymbolId> = HashMap::new();
    for relocation in code.relocations.iter() {
        let target = match relocation.symbol {
            Symbol::Tape => tape,
            Symbol::Function(intrinsic) => *externals.entry(intrinsic.symbol()).or_insert_with(|| {
                obj.add_symbol(symbol(intrinsic.symbol(), SymbolKind::Text, SymbolScope::Unknown))
            }),
        };

        let r_type = match relocation.kind {
            RelocationKind::PcRelative32 => elf::R_X86_64_PC32,
            RelocationKind::Plt32 => elf::R_X86_64_PLT32,
        };

        obj.add_relocation(
            text,
            write::Relocation {
                offset: main_offset + relocation.offset as u64,
                symbol: target,
                addend: relocation.addend,
                flags: RelocationFlags::Elf { r_type },
            },
        )?;
    }

    let bytes = obj.write()?;
    debug!(
        "wrote {} byte object ({} bytes of text, {} relocations, imports {:?})",
        bytes.len(),
        code.text.len(),
        code.relocations.len(),
        externals.keys().collect::<Vec<_>>()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use object::{Object as _, ObjectSection, ObjectSymbol, RelocationTarget};

    use super::*;
    use crate::{
        backend::EofPolicy,
        compiler::{CompileOptions, Compiler},
        native::x86_64::X86_64Codegen,
    };

    fn object_for(source: &str) -> Vec<u8> {
        let compilation = Compiler::new(CompileOptions::default())
            .compile(source.as_bytes())
            .unwrap();
        let code = X86_64Codegen::new(EofPolicy::Zero)
            .compile(compilation.module.ir())
            .unwrap();
        write_object(&code).unwrap()
    }

    #[test]
    fn main_is_a_global_function_in_text() {
        let bytes = object_for("+.");
        let file = object::File::parse(&*bytes).unwrap();

        assert_eq!(file.architecture(), Architecture::X86_64);
        assert!(file.section_by_name(".text").is_some());
        assert!(file.section_by_name(".bss").is_some());

        let main = file.symbol_by_name("main").unwrap();
        assert!(main.is_global());
        assert!(main.is_definition());
        assert_eq!(main.kind(), SymbolKind::Text);
    }

    #[test]
    fn tape_is_local_bss_of_the_right_size() {
        let bytes = object_for("");
        let file = object::File::parse(&*bytes).unwrap();
        let tape = file.symbol_by_name("tape").unwrap();
        assert!(tape.is_local());
        assert_eq!(tape.size(), 30_000);
    }

    #[test]
    fn io_functions_are_undefined_and_relocated() {
        let bytes = object_for(",.");
        let file = object::File::parse(&*bytes).unwrap();

        for name in ["putchar", "getchar"] {
            assert!(file.symbol_by_name(name).unwrap().is_undefined(), "{}", name);
        }

        let text = file.section_by_name(".text").unwrap();
        let mut targets = vec![];
        for (_, relocation) in text.relocations() {
            if let RelocationTarget::Symbol(index) = relocation.target() {
                let symbol = file.symbol_by_index(index).unwrap();
                targets.push((symbol.name().unwrap().to_string(), relocation.flags()));
            }
        }

        assert!(targets.contains(&(
            "putchar".to_string(),
            RelocationFlags::Elf {
                r_type: elf::R_X86_64_PLT32
            }
        )));
        assert!(targets.contains(&(
            "getchar".to_string(),
            RelocationFlags::Elf {
                r_type: elf::R_X86_64_PLT32
            }
        )));
    }

    #[test]
    fn programs_without_io_import_nothing() {
        let bytes = object_for("+>-");
        let file = object::File::parse(&*bytes).unwrap();
        assert!(file.symbol_by_name("putchar").is_none());
        assert!(file.symbol_by_name("getchar").is_none());
    }
}
