pub mod error;
mod generator;
pub mod parser;
pub mod progress;

use std::{
    env::consts::{DLL_PREFIX, DLL_SUFFIX},
    path::{Path, PathBuf},
    process::Command,
};

use tempfile::TempDir;
use tokio::sync::mpsc::Sender;

pub use error::{Error, GenResult};
pub use parser::{ModelInterface, PortDecl};
pub use progress::{Percentage, Progress};

const DEFAULT_VERILATOR_FLAGS: &[&str] = &[
    "-O3",
    "--unroll-count",
    "1000000",
    "--unroll-stmts",
    "1000000",
    "--assert",
    "-Wno-UNOPTFLAT",
    "-Wno-UNSIGNED",
];

#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub verilator: PathBuf,
    /// Resolved through `pkg-config` when unset.
    pub verilator_include_dir: Option<PathBuf>,
    pub verilator_flags: Vec<String>,
    /// Baked into the shim; every handle of the model writes a VCD here.
    pub trace_file: Option<PathBuf>,
    pub release: bool,
    pub leak_on_destroy: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            verilator: PathBuf::from("verilator"),
            verilator_include_dir: None,
            verilator_flags: DEFAULT_VERILATOR_FLAGS.iter().map(|f| f.to_string()).collect(),
            trace_file: None,
            release: true,
            leak_on_destroy: false,
        }
    }
}

impl BuildOptions {
    /// Defaults overridden by `VSHIM_VERILATOR`, `VSHIM_VERILATOR_INCLUDE_DIR`
    /// and `VSHIM_TRACE_FILE`.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(verilator) = var("VSHIM_VERILATOR") {
            options.verilator = PathBuf::from(verilator);
        }
        options.verilator_include_dir = var("VSHIM_VERILATOR_INCLUDE_DIR").map(PathBuf::from);
        options.trace_file = var("VSHIM_TRACE_FILE").map(PathBuf::from);
        options
    }

    pub fn verilator_include_dir(&self) -> GenResult<PathBuf> {
        if let Some(dir) = &self.verilator_include_dir {
            return Ok(dir.clone());
        }
        let output = Command::new("pkg-config")
            .args(["--variable=includedir", "verilator"])
            .output()
            .map_err(|_| Error::VerilatorIncludeDir)?;
        let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || dir.is_empty() {
            return Err(Error::VerilatorIncludeDir);
        }
        Ok(PathBuf::from(dir))
    }

    /// Install prefix holding `verilator-config.cmake`, one level above the
    /// include directory.
    pub fn verilator_root(&self) -> GenResult<PathBuf> {
        self.verilator_include_dir()?
            .parent()
            .map(Path::to_path_buf)
            .ok_or(Error::VerilatorIncludeDir)
    }
}

/// A generated and built shim. Dropping it removes every generated file,
/// the shared library included.
pub struct TempGenDir {
    crate_dir: TempDir,
    lib_path: PathBuf,
}

impl TempGenDir {
    pub fn lib_path(&self) -> PathBuf {
        self.crate_dir.path().join(&self.lib_path)
    }
}

pub struct Builder {
    notification_channel: Option<Sender<Progress>>,
    options: BuildOptions,
    progress: Percentage,
}

impl Builder {
    /// Progress goes through `blocking_send`, so `build` must run outside
    /// of an async context (e.g. in `spawn_blocking`).
    pub fn new(notification_channel: Option<Sender<Progress>>, options: BuildOptions) -> Self {
        Self {
            notification_channel,
            options,
            progress: Percentage::new(4),
        }
    }

    pub fn build(mut self, sv_path: &Path) -> GenResult<TempGenDir> {
        let top_name = top_module_name(sv_path)?;
        let sv_path = sv_path.canonicalize()?;
        let verilator_root = self.options.verilator_root()?;
        // Verilated here only to read the model header; the shim crate
        // verilates again from its own CMake project.
        let work_dir = TempDir::new()?;
        let obj_dir = work_dir.path().join("obj_dir");

        self.verilate(&sv_path, &top_name, &obj_dir)?;

        self.notify_progress("Reading model ports...");
        let header = std::fs::read_to_string(obj_dir.join(format!("V{top_name}.h")))?;
        let interface = parser::parse_ports(&top_name, &header)?;
        log::debug!("{top_name}: {} ports", interface.ports.len());
        self.progress.increment();

        self.notify_progress("Generating shim crate...");
        let crate_dir = generator::generate(&interface, &sv_path, &verilator_root, &self.options)?;
        self.progress.increment();

        self.cargo_build(crate_dir.path())?;
        let profile = if self.options.release { "release" } else { "debug" };
        let lib_path = PathBuf::from("target").join(profile).join(format!(
            "{DLL_PREFIX}{}{DLL_SUFFIX}",
            generator::crate_name(&top_name)
        ));
        self.notify_progress("Shim library generated!");
        log::info!("{top_name}: built {}", crate_dir.path().join(&lib_path).display());
        Ok(TempGenDir {
            crate_dir,
            lib_path,
        })
    }

    fn verilate(&mut self, sv_path: &Path, top_name: &str, obj_dir: &Path) -> GenResult<()> {
        self.notify_progress("Running verilator...");
        let sv_dir = sv_path
            .parent()
            .ok_or(Error::InvalidPath(sv_path.to_path_buf()))?;
        let mut command = Command::new(&self.options.verilator);
        command
            .arg("--cc")
            .arg(sv_path)
            .args(["--top-module", top_name])
            .arg("--Mdir")
            .arg(obj_dir)
            .args(&self.options.verilator_flags)
            .arg(format!("-y{}", sv_dir.display()));
        log::debug!("{command:?}");
        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::Verilator(stderr));
        }
        self.progress.increment();
        Ok(())
    }

    fn cargo_build(&mut self, crate_dir: &Path) -> GenResult<()> {
        self.notify_progress("Running cargo build...");
        let mut command = Command::new("cargo");
        command.current_dir(crate_dir).arg("build");
        if self.options.release {
            command.arg("--release");
        }
        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::Cargo(stderr));
        }
        self.progress.increment();
        Ok(())
    }

    fn notify_progress(&self, message: &str) {
        if let Some(channel) = &self.notification_channel {
            let progress = Progress {
                message: message.to_string(),
                percentage: self.progress.clone(),
            };
            if channel.blocking_send(progress).is_err() {
                log::warn!("progress receiver dropped: {message}");
            }
        }
    }
}

fn top_module_name(sv_path: &Path) -> GenResult<String> {
    if !sv_path.is_file() {
        return Err(Error::SvFilePathNotFound(sv_path.to_path_buf()));
    }
    match (sv_path.file_stem(), sv_path.extension()) {
        (Some(stem), Some(ext)) if ext == "sv" || ext == "v" => stem
            .to_str()
            .map(str::to_string)
            .ok_or(Error::InvalidPath(sv_path.to_path_buf())),
        (Some(_), _) => Err(Error::ExtensionNotSv(sv_path.to_path_buf())),
        (None, _) => Err(Error::InvalidPath(sv_path.to_path_buf())),
    }
}
