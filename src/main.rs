use anyhow::{Context, Result};
use clap::Parser;
use onepass::{compile, eval, Options};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    process,
};

/// Single-pass compiler for the accumulator machine
#[derive(Parser, Debug)]
struct Args {
    /// Compiles `<BASE_NAME>.s` into `<BASE_NAME>.a`
    base_name: String,
    /// Trace every token into the listing
    #[arg(short, long)]
    debug: bool,
    /// Run the listing after compiling, reading `readint` input from stdin
    #[arg(short, long)]
    run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    println!("onepass compiler");
    let in_name = format!("{}.s", args.base_name);
    let out_name = format!("{}.a", args.base_name);

    let src = fs::read_to_string(&in_name).with_context(|| format!("cannot read {in_name}"))?;
    let mut out = BufWriter::new(
        File::create(&out_name).with_context(|| format!("cannot create {out_name}"))?,
    );
    writeln!(out, "!register")?;
    writeln!(out, "; from onepass compiler")?;

    let options = Options {
        trace_tokens: args.debug,
    };
    if let Err(err) = compile(&src, &mut out, &options) {
        eprintln!("{err}");
        writeln!(out, "{err}")?;
        out.flush()?;
        process::exit(1);
    }
    out.flush()?;
    drop(out);

    if args.run {
        let listing = fs::read_to_string(&out_name)?;
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        let input = input
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<i32>, _>>()
            .context("readint input must be integers")?;
        print!("{}", eval::run(&listing, &input)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_arguments() {
        Args::command().debug_assert();
        let args = Args::try_parse_from(["onepass", "-d", "prog"]).unwrap();
        assert_eq!(args.base_name, "prog");
        assert!(args.debug && !args.run);
        assert!(Args::try_parse_from(["onepass"]).is_err());
    }
}
