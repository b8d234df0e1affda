//! List commands implementation

use crate::programmers::available_programmers;

/// List all supported programmers
pub fn list_programmers() {
    let programmers = available_programmers();
    if programmers.is_empty() {
        println!("No programmers available (recompile with programmer features enabled)");
        return;
    }

    println!("Supported programmers:");
    println!();
    for p in &programmers {
        println!("  {:10} - {}", p.name, p.description);
        if !p.aliases.is_empty() {
            println!("  {:10}   aliases: {}", "", p.aliases.join(", "));
        }
    }
}
