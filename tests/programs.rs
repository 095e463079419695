use brainforge::{
    lexer::Position, Backend, CompileFlags, CompileOptions, Compiler, EofPolicy, Error,
    ExecutionEngine, ObjectEmitter, Runtime, SyntaxError,
};

const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

fn execute(options: CompileOptions, source: &str, input: &[u8], eof: EofPolicy) -> Vec<u8> {
    let compilation = Compiler::new(options).compile(source.as_bytes()).unwrap();
    let mut out = Vec::new();
    {
        let runtime = Runtime::new(Box::new(input), Box::new(&mut out)).with_eof_policy(eof);
        let status = ExecutionEngine::new(runtime)
            .with_step_limit(10_000_000)
            .consume(compilation.module)
            .unwrap();
        assert_eq!(status, 0);
    }
    out
}

fn run(source: &str, input: &[u8]) -> Vec<u8> {
    execute(CompileOptions::default(), source, input, EofPolicy::Zero)
}

fn run_optimized(source: &str, input: &[u8]) -> Vec<u8> {
    let options = CompileOptions {
        flags: CompileFlags::OPTIMIZE,
        ..CompileOptions::default()
    };
    execute(options, source, input, EofPolicy::Zero)
}

#[test]
fn hello_world() {
    assert_eq!(run(HELLO_WORLD, b""), b"Hello World!\n");
}

#[test]
fn cat_echoes_until_end_of_input() {
    assert_eq!(run(",[.,]", b"abc"), b"abc");
}

#[test]
fn minus_one_eof_keeps_cat_running_until_the_cell_wraps() {
    // 255 on eof, `+` brings it back to 0 which ends the loop
    let out = execute(
        CompileOptions::default(),
        ",+[-.,+]",
        b"hi",
        EofPolicy::MinusOne,
    );
    assert_eq!(out, b"hi");
}

#[test]
fn addition_loop() {
    assert_eq!(run("++>+++++[<+>-]<.", b""), vec![7]);
}

#[test]
fn clear_loop() {
    assert_eq!(run("+++++[-].", b""), vec![0]);
}

#[test]
fn loop_skipped_when_cell_is_zero() {
    assert_eq!(run("[+++++.]+.", b""), vec![1]);
}

#[test]
fn nested_loops_multiply() {
    // 4 * 3 * 5
    assert_eq!(run("++++[>+++[>+++++<-]<-]>>.", b""), vec![60]);
}

#[test]
fn cells_wrap_modulo_256() {
    let mut source = "+".repeat(256);
    source.push('.');
    source.push_str("-.");
    assert_eq!(run(&source, b""), vec![0, 255]);
}

#[test]
fn cursor_wraps_on_a_small_tape() {
    let options = CompileOptions {
        memory_size: 3,
        ..CompileOptions::default()
    };
    // starts on cell 1, three moves right lands back on it
    let out = execute(options, "+>>>.", b"", EofPolicy::Zero);
    assert_eq!(out, vec![1]);
}

#[test]
fn comments_are_ignored() {
    assert_eq!(
        run("add two: ++ and print it .", b""),
        run("++.", b"")
    );
}

#[test]
fn unmatched_close_bracket_reports_offset() {
    let result = Compiler::default().compile(b"+++[>+++<-]++]");
    match result {
        Err(Error::Syntax(SyntaxError::UnmatchedCloseBracket { position })) => {
            assert_eq!(
                position,
                Position {
                    offset: 13,
                    line: 1,
                    column: 14
                }
            );
        }
        other => panic!("expected an unmatched ']', got {:?}", other),
    }
}

#[test]
fn unmatched_open_bracket_is_rejected() {
    let result = Compiler::default().compile(b"+[[-]");
    assert!(matches!(
        result,
        Err(Error::Syntax(SyntaxError::UnmatchedOpenBracket { .. }))
    ));
}

#[test]
fn optimized_programs_behave_the_same() {
    let programs: [(&str, &[u8]); 6] = [
        (HELLO_WORLD, b""),
        (",[.,]", b"optimize me"),
        ("++>+++++[<+>-]<.", b""),
        ("+++>++<[->>+<<]>>.<.", b""),
        (",>,<[->+<]>.", b"\x03\x04"),
        ("-->+++<[>.<+]", b""),
    ];

    for (source, input) in programs {
        assert_eq!(
            run(source, input),
            run_optimized(source, input),
            "{}",
            source
        );
    }
}

#[test]
fn statistics_count_every_instruction() {
    let compilation = Compiler::default().compile(HELLO_WORLD.as_bytes()).unwrap();
    let statistics = compilation.statistics;
    assert_eq!(statistics.total(), HELLO_WORLD.len());
    assert_eq!(statistics.get('['), statistics.get(']'));
    assert_eq!(statistics.get('.'), 13);
    assert_eq!(statistics.get(','), 0);
}

#[test]
fn object_file_for_hello_world() {
    let compilation = Compiler::new(CompileOptions {
        flags: CompileFlags::OPTIMIZE,
        ..CompileOptions::default()
    })
    .compile(HELLO_WORLD.as_bytes())
    .unwrap();
    let bytes = ObjectEmitter::default().consume(compilation.module).unwrap();
    assert_eq!(&bytes[..4], b"\x7fELF");
}
