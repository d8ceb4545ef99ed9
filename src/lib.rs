#![allow(clippy::module_inception)]

use std::{fs, path::PathBuf, rc::Rc};

use crate::errors::errors::{Error, ErrorTip};

pub mod blocks;
pub mod bytecode;
pub mod compiler;
pub mod errors;
pub mod macros;
pub mod resolver;
pub mod scope;
pub mod types;

/// A source location: 1-based line number plus the file it came from.
///
/// The external block builder resolves indentation before this crate runs,
/// so positions are line-granular rather than byte-granular.
#[derive(Debug, Clone)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

/// The line range a block covers, including its children.
#[derive(Debug, Clone)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn null() -> Self {
        Span {
            start: Position::null(),
            end: Position::null(),
        }
    }
}

pub fn get_line(file: PathBuf, line_number: u32) -> Option<String> {
    let content = fs::read_to_string(&file).ok()?;
    content
        .lines()
        .nth(line_number.saturating_sub(1) as usize)
        .map(|line| line.to_string())
}

pub fn display_error(error: Error, file: PathBuf) {
    /*
        Error: name (tip)
        -> final.rill
           |
        20 | total = total + n
           |
    */

    let position = error.get_position();

    if let ErrorTip::None = error.get_tip() {
        println!("Error: {}", error.get_error_name());
    } else {
        println!("Error: {} ({})", error.get_error_name(), error.get_tip());
    }
    println!("-> {}", file.as_os_str().to_string_lossy());

    if let Some(line_text) = get_line(file, position.0) {
        let line_string = position.0.to_string();
        let padding = line_string.len() + 2;

        println!("{:>padding$}", "|");
        println!("{} | {}", line_string, line_text.trim());
        println!("{:>padding$}", "|");
    }
}
