//! dnsbpf CLI
//!
//! Compiles DNS query-name patterns into a classic BPF filter.

mod assembler;

use clap::{Parser, ValueEnum};

use dnsbpf_compiler::{compile, render_program};
use dnsbpf_core::bytecode::{encode_bytecode, encode_c_array, SockFilter};
use dnsbpf_core::CompileFlags;

use crate::assembler::{Assembler, DEFAULT_ASSEMBLER};

const AFTER_HELP: &str = "\
Builds a raw BPF rule matching packets that look like a DNS query whose first
question equals one of the given domains.

  dnsbpf example.com        matches queries for exactly example.com
  dnsbpf '*.www.fint.me'    matches blah.www.fint.me, but neither
                            www.fint.me nor blah.blah.www.fint.me

A star is a wildcard only when it is a whole label: '*xxx.example.com' and
'xxx*.example.com' are literal, 'xxx.*.example.com' is a wildcard. Several
domains build a single rule matching any of them. Leading and trailing dots
are ignored.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// count,code jt jf k,... as accepted by iptables -m bpf --bytecode
    Bytecode,
    /// C array initializer lines
    C,
    /// JSON array of instructions
    Json,
}

#[derive(Parser)]
#[command(name = "dnsbpf")]
#[command(about = "Compile DNS query-name patterns into a BPF filter")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Capture packets that don't match the given domains
    #[arg(short, long)]
    negate: bool,

    /// Make the rule case insensitive (masks every byte with 0x20, use with care)
    #[arg(short, long)]
    ignore_case: bool,

    /// Print BPF assembly instead of byte code
    #[arg(short = 's', long)]
    assembly: bool,

    /// Byte code output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Bytecode)]
    format: OutputFormat,

    /// BPF assembler reading the program on stdin
    #[arg(long, env = "DNSBPF_ASSEMBLER", default_value = DEFAULT_ASSEMBLER)]
    assembler: String,

    /// Extra argument passed to the assembler (repeatable)
    #[arg(long = "assembler-arg", value_name = "ARG", allow_hyphen_values = true)]
    assembler_args: Vec<String>,

    /// Domain patterns, optionally starting with a '*' label
    domains: Vec<String>,
}

impl Cli {
    fn flags(&self) -> CompileFlags {
        let mut flags = CompileFlags::empty();
        flags.set(CompileFlags::NEGATE, self.negate);
        flags.set(CompileFlags::IGNORE_CASE, self.ignore_case);
        flags
    }
}

fn main() {
    env_logger::init();

    // Help and usage errors both exit with status 2
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(2);
        }
    };

    match cmd_compile(&cli) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Everything is produced before anything is printed, so a failing
/// assembler never leaves partial output on stdout.
fn cmd_compile(cli: &Cli) -> Result<String, String> {
    let program = compile(cli.domains.as_slice(), cli.flags()).map_err(|e| e.to_string())?;
    let text = render_program(&program);

    if cli.assembly {
        return Ok(text);
    }

    let bytecode = Assembler::new(cli.assembler.as_str())
        .args(&cli.assembler_args)
        .assemble(&text)
        .map_err(|e| e.to_string())?;

    log::info!(
        "Assembled {} patterns into {} BPF instructions",
        cli.domains.len(),
        bytecode.len()
    );

    format_bytecode(&bytecode, cli.format)
}

fn format_bytecode(bytecode: &[SockFilter], format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Bytecode => Ok(format!("{}\n", encode_bytecode(bytecode))),
        OutputFormat::C => Ok(encode_c_array(bytecode)),
        OutputFormat::Json => serde_json::to_string_pretty(bytecode)
            .map(|json| json + "\n")
            .map_err(|e| format!("Failed to serialize byte code: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use dnsbpf_core::bytecode::SockFilter;
    use dnsbpf_core::CompileFlags;

    use super::{format_bytecode, Cli, OutputFormat};

    #[test]
    fn parses_short_flags() {
        let cli = Cli::try_parse_from(["dnsbpf", "-n", "-i", "-s", "example.com", "fint.me"])
            .expect("should parse");
        assert!(cli.assembly);
        assert_eq!(cli.flags(), CompileFlags::NEGATE | CompileFlags::IGNORE_CASE);
        assert_eq!(cli.domains, vec!["example.com", "fint.me"]);
    }

    #[test]
    fn parses_long_flags() {
        let cli = Cli::try_parse_from([
            "dnsbpf",
            "--negate",
            "--ignore-case",
            "--assembly",
            "--format",
            "json",
            "--assembler",
            "/usr/bin/bpfc",
            "--assembler-arg",
            "-f",
            "--assembler-arg",
            "xt_bpf",
            "*.www.fint.me",
        ])
        .expect("should parse");
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.assembler, "/usr/bin/bpfc");
        assert_eq!(cli.assembler_args, vec!["-f", "xt_bpf"]);
        assert_eq!(cli.domains, vec!["*.www.fint.me"]);
    }

    #[test]
    fn rejects_unknown_option() {
        assert!(Cli::try_parse_from(["dnsbpf", "--bogus", "example.com"]).is_err());
    }

    #[test]
    fn formats_bytecode() {
        let program = [
            SockFilter { code: 6, jt: 0, jf: 0, k: 1 },
            SockFilter { code: 6, jt: 0, jf: 0, k: 0 },
        ];
        assert_eq!(
            format_bytecode(&program, OutputFormat::Bytecode).expect("format"),
            "2,6 0 0 1,6 0 0 0\n"
        );
        assert_eq!(
            format_bytecode(&program, OutputFormat::C).expect("format"),
            "{ 0x6, 0, 0, 0x00000001 },\n{ 0x6, 0, 0, 0x00000000 },\n"
        );
        let json = format_bytecode(&program, OutputFormat::Json).expect("format");
        let parsed: Vec<SockFilter> = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed, program);
    }
}
