/*!
This crate is a whole-program compiler for C--, a small statically typed
imperative language with `int` and `void` scalars, one-dimensional integer
arrays, functions and the built-in I/O intrinsics `input` and `output`. It
compiles a single source file down to GNU-assembler x86_64 assembly
(Intel syntax) that links into a freestanding executable.

## Compilation stages

1. **Lexing** - [lex](lexer::lex) scans the source text into a
   [Token](lexer::Token) sequence terminated by an end-of-file token. Every
   token carries its lexeme and source position. An unknown character raises
   [LexError](lexer::LexError); the lexer does not recover.
2. **Parsing** - [parse](parser::parse) runs a predictive recursive-descent
   parser over the tokens and produces a [Program](ast::Program). On a syntax
   error it records a [SyntaxError](parser::SyntaxError), synchronizes on a
   statement boundary and keeps going, so one run reports as many problems
   as possible.
3. **Semantic analysis** - [analyze](semantic_analysis::analyze) builds a
   nested [SymbolTable](semantic_analysis::SymbolTable), checks types, arity
   and the `int main(void)` contract, and accumulates every
   [SemanticError](semantic_analysis::SemanticError) instead of stopping at
   the first one.
4. **IR generation** - [generate](irgen::generate) lowers the validated AST
   into flat three-address code ([Instruction](ir::Instruction)). From this
   stage on a malformed input means a compiler bug and raises [panic!].
5. **Optimization** - [optimize](optimizer::optimize) rewrites the IR at the
   selected [OptLevel](optimizer::OptLevel): peephole passes at `O1`, a
   control-flow graph plus dataflow analyses at `O2`, loop transforms and
   scheduling at `O3`.
6. **Code generation** - [generate](codegen::generate) walks the IR and emits
   assembly lines through the [emission] module, which also provides the
   `_start` framing, the `.data` section and the `input`/`output` runtime
   stubs.

The driver binary sequences the stages, routes diagnostics (errors to
stderr, warnings to stdout) and hands the assembly to `as` and `ld`.

[panic!]: https://doc.rust-lang.org/std/macro.panic.html
*/

#![deny(unused_must_use)]
#![warn(clippy::pedantic)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]

pub mod ast;
pub mod codegen;
pub mod emission;
pub mod ir;
pub mod irgen;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod semantic_analysis;
