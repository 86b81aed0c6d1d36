use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};

const FIXTURE_DIR: &str = "demos/fixtures";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo xtask <command>");
        eprintln!("Commands:");
        eprintln!("  gen-fixtures            Write the sample .ll fixtures used for manual insttool runs");
        eprintln!("  instrument <file.ll>    Run insttool over a fixture and print the rewritten IR");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "gen-fixtures" => gen_fixtures(),
        "instrument" => instrument(args.get(2).map(String::as_str)),
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(1);
        }
    }
}

fn gen_fixtures() -> Result<()> {
    fs::create_dir_all(FIXTURE_DIR).with_context(|| format!("creating {FIXTURE_DIR}"))?;

    let fixtures: &[(&str, &str)] = &[
        (
            "arith_overflow.ll",
            "define i32 @add_two(i32 %a, i32 %b) {\nentry:\n  %sum = add nsw i32 %a, %b\n  ret i32 %sum\n}\n",
        ),
        (
            "div_by_zero.ll",
            "define i32 @divide(i32 %a, i32 %b) {\nentry:\n  %q = sdiv i32 %a, %b\n  ret i32 %q\n}\n",
        ),
        (
            "loop.ll",
            "define i32 @count_to(i32 %n) {\nentry:\n  br label %loop\nloop:\n  %i = phi i32 [ 0, %entry ], [ %i.next, %loop ]\n  %i.next = add i32 %i, 1\n  %done = icmp sge i32 %i.next, %n\n  br i1 %done, label %exit, label %loop\nexit:\n  ret i32 %i.next\n}\n",
        ),
    ];

    for (name, contents) in fixtures {
        let path = Path::new(FIXTURE_DIR).join(name);
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn instrument(path: Option<&str>) -> Result<()> {
    let Some(path) = path else {
        bail!("usage: cargo xtask instrument <file.ll>");
    };

    let status = Command::new("cargo")
        .args(["run", "--quiet", "--package", "trace2pass-instrument", "--bin", "insttool", "--", path, "--all-checks"])
        .status()
        .context("failed to invoke insttool")?;

    if !status.success() {
        bail!("insttool exited with status: {status}");
    }
    Ok(())
}
