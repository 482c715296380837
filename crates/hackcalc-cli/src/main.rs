#![forbid(unsafe_code)]

// Native-only tool. The wasm32 stub keeps `--target wasm32-unknown-unknown --workspace` builds
// working.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use anyhow::{bail, Context, Result};
    use clap::{Parser, Subcommand};
    use hackcalc_engine::WasmEngine;
    use hackcalc_host::{FsSourceReader, Host, HostConfig, PipelineOutcome, SourceFile};
    use hackcalc_io::{DisplayState, KeySample};

    #[derive(Debug, Parser)]
    #[command(name = "hackcalc", about = "Headless runner for calculator programs")]
    pub struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[derive(Debug, Subcommand)]
    enum Command {
        /// Compile source files with an engine module and run the program for a number of ticks.
        Run(RunArgs),
    }

    #[derive(Debug, clap::Args)]
    struct RunArgs {
        /// Engine WebAssembly module (binary or text form).
        #[arg(long)]
        engine: PathBuf,

        /// Source files, compiled in the given order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Engine steps per tick. Defaults to `HACKCALC_SPEED` or 1000.
        #[arg(long)]
        speed: Option<u32>,

        /// Number of scheduler ticks to run. Stops early if the program halts.
        #[arg(long, default_value_t = 1000)]
        ticks: u64,

        /// Keys to press, one per tick with a released tick in between (e.g. "12+3=").
        #[arg(long, default_value = "")]
        keys: String,
    }

    pub fn main() -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();

        let cli = Cli::parse();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .context("failed to start runtime")?;
        match cli.command {
            Command::Run(args) => runtime.block_on(run(args)),
        }
    }

    async fn run(args: RunArgs) -> Result<()> {
        let mut config = HostConfig::from_env().context("invalid environment configuration")?;
        if let Some(speed) = args.speed {
            config.steps_per_tick = speed;
        }

        let engine = WasmEngine::from_file(&args.engine)
            .with_context(|| format!("failed to load engine {}", args.engine.display()))?;
        let mut host = Host::new(engine, config).context("failed to initialize engine")?;

        let files = args.files.iter().map(|p| SourceFile::from_path(p)).collect();
        host.load_files(files)?;
        let outcome = host.compile(&mut FsSourceReader).await;
        print_console(&mut host);
        match outcome? {
            PipelineOutcome::Ready => {}
            PipelineOutcome::Rejected { file } => bail!("{file} was rejected by the engine"),
        }
        print_artifacts(&host);

        if !host.start() {
            bail!("program could not be started");
        }
        let keys: Vec<char> = args.keys.chars().collect();
        let mut ran = 0;
        for tick in 0..args.ticks {
            host.set_input(scripted_key(&keys, tick));
            let report = host.tick()?;
            ran += 1;
            print_console(&mut host);
            if report.is_some_and(|r| r.halted) {
                println!("program halted after {ran} ticks");
                break;
            }
        }

        tracing::debug!(ticks = ran, state = ?host.run_state(), "run finished");
        println!("display: {}", hex_codes(host.display()));
        println!("text:    [{}]", render_text(host.display()));
        Ok(())
    }

    /// Key held during `tick`: keys go on even ticks, odd ticks release.
    fn scripted_key(keys: &[char], tick: u64) -> KeySample {
        if tick % 2 != 0 {
            return KeySample::NONE;
        }
        usize::try_from(tick / 2)
            .ok()
            .and_then(|i| keys.get(i))
            .map_or(KeySample::NONE, |c| KeySample::char(*c))
    }

    fn print_console(host: &mut Host<WasmEngine>) {
        for line in host.take_console() {
            println!("engine: {line}");
        }
    }

    fn print_artifacts(host: &Host<WasmEngine>) {
        let Some(session) = host.artifacts() else {
            return;
        };
        for (name, code) in session.vm_artifacts() {
            println!("{name}: {} bytes", code.len());
        }
        if let Some(assembly) = session.assembly() {
            println!("assembly: {} bytes, {} lines", assembly.len(), assembly.lines().count());
        }
        for (name, stream) in session.machine_code_artifacts() {
            println!("{name}: {} bytes", stream.len());
        }
    }

    fn hex_codes(display: &DisplayState) -> String {
        display
            .codes()
            .iter()
            .map(|c| format!("{c:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn render_text(display: &DisplayState) -> String {
        let mut out = String::new();
        for digit in display.digits() {
            out.push(match digit.segments().bits() {
                0x00 => ' ',
                0x3F => '0',
                0x06 => '1',
                0x5B => '2',
                0x4F => '3',
                0x66 => '4',
                0x6D => '5',
                0x7D => '6',
                0x07 => '7',
                0x7F => '8',
                0x6F => '9',
                0x40 => '-',
                0x79 => 'E',
                _ => '?',
            });
            if digit.decimal_point() {
                out.push('.');
            }
        }
        out
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}
