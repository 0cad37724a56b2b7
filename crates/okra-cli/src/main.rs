use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use okra_bridge::sim::{self, SimOptions};
use okra_bridge::{Bridge, BridgeConfig};
use okra_core::{ArgumentValue, BridgeError, HeapRegion, KernelBinary, KernelSignature, ObjectRef, ParamKind};

#[derive(Parser)]
#[command(
    name = "okra",
    about = "okra GPU offload bridge CLI",
    long_about = "Inspect the okra runtime and launch compiled kernels through the same\ninvocation protocol a JIT uses: link, create context, register heap,\nload kernel, push arguments, execute.",
    version
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Backend {
    /// Use the in-process simulated runtime instead of the shared library
    #[arg(long)]
    simulate: bool,
    /// Path to the okra runtime library (overrides OKRA_LIBRARY)
    #[arg(long)]
    library: Option<PathBuf>,
    /// Core count reported by the simulated runtime
    #[arg(long, requires = "simulate")]
    sim_cores: Option<u32>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Check linkage, create the device context and report capabilities
    Info {
        #[command(flatten)]
        backend: Backend,
        /// Print the effective bridge configuration as JSON and exit
        #[arg(long)]
        json: bool,
    },
    /// Load a kernel binary and launch it over a 1-D range
    Run {
        #[command(flatten)]
        backend: Backend,
        /// Compiled kernel file
        #[arg(long)]
        kernel: PathBuf,
        /// Kernel name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Method descriptor, e.g. "(I[FF)V"
        #[arg(long, default_value = "()V")]
        signature: String,
        /// Treat the descriptor as an instance method (leading receiver object)
        #[arg(long)]
        instance: bool,
        /// Work-items in the launch
        #[arg(long)]
        dim: i32,
        /// Argument values in slot order; objects are "null" or "@OFFSET" into the host heap
        #[arg(long = "arg", value_name = "VALUE", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Size of the host heap registered with the device
        #[arg(long, default_value = "1048576")]
        heap_bytes: usize,
        /// Launch this many times with the same arguments
        #[arg(long, default_value = "1")]
        repeat: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { backend, json: true } => cmd_config(&backend),
        Commands::Info { backend, json: false } => with_bridge(&backend, |bridge| cmd_info(bridge, backend.simulate)),
        Commands::Run {
            backend,
            kernel,
            name,
            signature,
            instance,
            dim,
            args,
            heap_bytes,
            repeat,
        } => with_bridge(&backend, |bridge| {
            cmd_run(bridge, &kernel, name.as_deref(), &signature, instance, dim, &args, heap_bytes, repeat)
        }),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn effective_config(backend: &Backend) -> Result<BridgeConfig> {
    let mut config = BridgeConfig::from_env().context("reading okra configuration")?;
    if let Some(lib) = &backend.library {
        config.library_path = lib.clone();
    }
    Ok(config)
}

/// Run `f` against the simulated runtime or the process-wide native bridge.
fn with_bridge<R>(backend: &Backend, f: impl FnOnce(&Bridge) -> Result<R>) -> Result<R> {
    let config = effective_config(backend)?;
    if backend.simulate {
        let resolver = sim::install(SimOptions {
            total_cores: backend.sim_cores,
            ..Default::default()
        });
        f(&Bridge::new(resolver, config))
    } else {
        f(okra_bridge::init_global(config))
    }
}

fn cmd_config(backend: &Backend) -> Result<()> {
    let config = effective_config(backend)?;
    println!("{}", config.to_json_string()?);
    Ok(())
}

fn cmd_info(bridge: &Bridge, simulated: bool) -> Result<()> {
    println!("okra bridge v{}\n", env!("CARGO_PKG_VERSION"));
    println!("Runtime");
    if simulated {
        println!("  Library: (simulated)");
    } else {
        println!("  Library: {}", bridge.config().library_path.display());
    }

    if let Err(e) = bridge.probe_linkage() {
        println!("  Linkage: [ ] {}", e);
        println!("\nGPU offload unavailable; kernels run on the host.");
        return Ok(());
    }
    println!("  Linkage: [x]");

    match bridge.initialize_gpu() {
        Ok(ctx) => {
            println!("  Context: [x]");
            println!("\nDevice");
            println!("  Cores:   {}", ctx.total_cores());
        }
        Err(e) => {
            println!("  Context: [ ] {}", e);
            println!("\nGPU offload unavailable; kernels run on the host.");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    bridge: &Bridge,
    kernel_path: &Path,
    name: Option<&str>,
    descriptor: &str,
    instance: bool,
    dim: i32,
    raw_args: &[String],
    heap_bytes: usize,
    repeat: u32,
) -> Result<()> {
    let signature = KernelSignature::parse(descriptor, !instance)?;
    let heap = vec![0u8; heap_bytes];
    let args = parse_args(&signature, raw_args, &heap)?;

    let code = std::fs::read(kernel_path).with_context(|| format!("reading {}", kernel_path.display()))?;
    let name = match name {
        Some(n) => n.to_string(),
        None => kernel_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("kernel path has no file name; pass --name")?,
    };
    let binary = KernelBinary::new(&code, &name)?;

    let ctx = bridge.initialize_gpu()?;
    let region = bridge.register_heap(&HeapRegion::from_slice(&heap))?;
    tracing::info!("host heap {} registered", region);

    let mut kernel = match ctx.generate_kernel(&binary) {
        Ok(k) => k,
        Err(e @ BridgeError::KernelLoad { .. }) => {
            bail!("{} (the kernel would run on the host)", e);
        }
        Err(e) => return Err(e.into()),
    };

    let start = Instant::now();
    for _ in 0..repeat {
        bridge.execute_kernel_void_1d(&mut kernel, dim, &args, &signature)?;
    }
    let elapsed = start.elapsed();

    println!(
        "kernel '{}' ran {} time(s) over [{}] with {} argument(s) in {:?}",
        kernel.name(),
        kernel.launches(),
        dim,
        args.len(),
        elapsed
    );
    Ok(())
}

/// Convert textual values to typed arguments, one per signature slot.
fn parse_args(signature: &KernelSignature, raw: &[String], heap: &[u8]) -> Result<Vec<ArgumentValue>> {
    if raw.len() != signature.arity() {
        bail!(
            "signature has {} slot(s) but {} --arg value(s) were given",
            signature.arity(),
            raw.len()
        );
    }
    signature
        .slots()
        .zip(raw)
        .enumerate()
        .map(|(i, (kind, text))| parse_value(kind, text, heap).with_context(|| format!("argument {} ({})", i, kind)))
        .collect()
}

fn parse_value(kind: ParamKind, text: &str, heap: &[u8]) -> Result<ArgumentValue> {
    let text = text.trim();
    let value = match kind {
        ParamKind::Object => ArgumentValue::Object(parse_object(text, heap)?),
        ParamKind::Boolean => ArgumentValue::Boolean(match text {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => bail!("expected true/false, got {:?}", text),
        }),
        ParamKind::Byte => ArgumentValue::Byte(text.parse()?),
        ParamKind::Short => ArgumentValue::Short(text.parse()?),
        ParamKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_ascii_digit() => {
                    ArgumentValue::Char(u16::try_from(u32::from(c)).context("character outside the BMP")?)
                }
                _ => ArgumentValue::Char(text.parse()?),
            }
        }
        ParamKind::Int => ArgumentValue::Int(text.parse()?),
        ParamKind::Long => ArgumentValue::Long(text.parse()?),
        ParamKind::Float => ArgumentValue::Float(text.parse()?),
        ParamKind::Double => ArgumentValue::Double(text.parse()?),
    };
    Ok(value)
}

fn parse_object(text: &str, heap: &[u8]) -> Result<ObjectRef> {
    if text == "null" {
        return Ok(ObjectRef::NULL);
    }
    let Some(offset) = text.strip_prefix('@') else {
        bail!("object arguments are \"null\" or \"@OFFSET\", got {:?}", text);
    };
    let offset: usize = match offset.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16)?,
        None => offset.parse()?,
    };
    if offset >= heap.len() {
        bail!("offset {} is outside the {}-byte host heap", offset, heap.len());
    }
    Ok(ObjectRef::from_addr(heap.as_ptr() as usize + offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_per_slot() {
        let heap = vec![0u8; 64];
        let sig = KernelSignature::parse("(IZCLjava/lang/Object;D)V", true).unwrap();
        let raw: Vec<String> = ["-3", "true", "A", "@0x10", "0.25"].iter().map(|s| s.to_string()).collect();
        let args = parse_args(&sig, &raw, &heap).unwrap();
        assert_eq!(args[0], ArgumentValue::Int(-3));
        assert_eq!(args[1], ArgumentValue::Boolean(true));
        assert_eq!(args[2], ArgumentValue::Char(65));
        assert_eq!(args[3], ArgumentValue::Object(ObjectRef::from_addr(heap.as_ptr() as usize + 16)));
        assert_eq!(args[4], ArgumentValue::Double(0.25));
    }

    #[test]
    fn test_parse_args_count() {
        let sig = KernelSignature::parse("(II)V", true).unwrap();
        assert!(parse_args(&sig, &["1".to_string()], &[]).is_err());
    }

    #[test]
    fn test_parse_object_bounds() {
        let heap = vec![0u8; 8];
        assert_eq!(parse_object("null", &heap).unwrap(), ObjectRef::NULL);
        assert!(parse_object("@8", &heap).is_err());
        assert!(parse_object("12", &heap).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "okra", "run", "--simulate", "--kernel", "k.hsail", "--signature", "(IF)V", "--dim", "64", "--arg", "-1",
            "--arg", "0.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { backend, args, dim, .. } => {
                assert!(backend.simulate);
                assert_eq!(dim, 64);
                assert_eq!(args, vec!["-1".to_string(), "0.5".to_string()]);
            }
            Commands::Info { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_info_json_flag() {
        let cli = Cli::try_parse_from(["okra", "info", "--json", "--library", "/opt/okra/libokra.so"]).unwrap();
        match cli.command {
            Commands::Info { backend, json } => {
                assert!(json);
                let config = effective_config(&backend).unwrap();
                assert_eq!(config.library_path, PathBuf::from("/opt/okra/libokra.so"));
                assert!(config.to_json_string().unwrap().contains("/opt/okra/libokra.so"));
            }
            Commands::Run { .. } => panic!("expected info"),
        }
    }
}
