use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    parser::ModelInterface,
    BuildOptions, Error, GenResult,
};

use tempfile::TempDir;
use vshim_rs::Direction;

macro_rules! generate_lines_from_symbol_access {
    ($template:expr, $ports:expr) => {{
        $ports
            .iter()
            .flat_map(|p| p.leaves())
            .map(|l| format!($template, l.symbol, l.access))
            .collect::<Vec<String>>()
            .join("\n")
    }};
}

macro_rules! generate_lines_from_symbol {
    ($template:expr, $ports:expr) => {{
        $ports
            .iter()
            .flat_map(|p| p.leaves())
            .map(|l| format!($template, l.symbol))
            .collect::<Vec<String>>()
            .join("\n")
    }};
}

macro_rules! port_getter_template {
    () => {
        concat!(
            "void *vshim_port_{0}(void *model) {{\n",
            "  return &static_cast<model_t *>(model)->{1};\n",
            "}}"
        )
    };
}

macro_rules! port_getter_declaration_template {
    () => {
        "    fn vshim_port_{0}(model: *mut c_void) -> *mut c_void;"
    };
}

/// Writes the shim crate for `interface`. Its build script verilates
/// `sv_path` again through CMake, finding Verilator under `verilator_root`.
pub fn generate(
    interface: &ModelInterface,
    sv_path: &Path,
    verilator_root: &Path,
    options: &BuildOptions,
) -> GenResult<TempDir> {
    Generator::new(interface, sv_path, verilator_root, options)?.generate()
}

/// Name of the generated crate, which also names the shared library.
pub fn crate_name(top_name: &str) -> String {
    format!("vshim_{top_name}")
}

struct Generator<'a> {
    temp_dir: TempDir,
    interface: &'a ModelInterface,
    sv_path: &'a Path,
    verilator_root: &'a Path,
    options: &'a BuildOptions,
}

impl<'a> Generator<'a> {
    fn new(
        interface: &'a ModelInterface,
        sv_path: &'a Path,
        verilator_root: &'a Path,
        options: &'a BuildOptions,
    ) -> GenResult<Self> {
        Ok(Generator {
            temp_dir: TempDir::new()?,
            interface,
            sv_path,
            verilator_root,
            options,
        })
    }

    fn generate(self) -> GenResult<TempDir> {
        std::fs::create_dir(self.temp_dir.path().join("src"))?;
        self.put_cargo_toml()?;
        self.put_build_rs()?;
        self.put_cmakelists_txt()?;
        self.put_glue_cpp()?;
        self.put_lib_rs()?;
        self.put_shim_h()?;
        Ok(self.temp_dir)
    }

    fn put_cargo_toml(&self) -> GenResult<()> {
        let content = include_str!("templates/Cargo.toml.templated");
        let vshim_rs_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("vshim_rs");
        let features = if self.options.leak_on_destroy {
            ", features = [\"leak-on-destroy\"]"
        } else {
            ""
        };
        let content = content.replace("/*CRATE_NAME*/", &crate_name(&self.interface.top_name));
        let content = content.replace("/*VSHIM_RS_PATH*/", path_str(&vshim_rs_path)?);
        let content = content.replace("/*VSHIM_FEATURES*/", features);
        self.put_file("Cargo.toml", content.as_bytes())?;
        Ok(())
    }

    fn put_build_rs(&self) -> GenResult<()> {
        let content = include_str!("templates/build.rs.templated");
        let content = content.replace("/*VERILATOR_ROOT*/", path_str(self.verilator_root)?);
        self.put_file("build.rs", content.as_bytes())?;
        Ok(())
    }

    fn put_cmakelists_txt(&self) -> GenResult<()> {
        let content = include_str!("templates/CMakeLists.txt.templated");
        let sv_dir = self
            .sv_path
            .parent()
            .ok_or_else(|| Error::InvalidPath(self.sv_path.to_path_buf()))?;
        let verilator_args = self
            .options
            .verilator_flags
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<String>>()
            .join(" ");
        let content = content.replace("/*SV_PATH*/", path_str(self.sv_path)?);
        let content = content.replace("/*SV_DIR*/", path_str(sv_dir)?);
        let content = content.replace("/*TOP*/", &self.interface.top_name);
        let content = content.replace("/*VERILATOR_ARGS*/", &verilator_args);
        self.put_file("CMakeLists.txt", content.as_bytes())?;
        Ok(())
    }

    fn put_glue_cpp(&self) -> GenResult<()> {
        let content = include_str!("templates/glue.cpp.templated");
        let getters = generate_lines_from_symbol_access!(port_getter_template!(), self.interface.ports);
        let content = content.replace("/*TOP*/", &self.interface.top_name);
        let content = content.replace("// TEMPLATED: port getters", &getters);
        self.put_file("glue.cpp", content.as_bytes())?;
        Ok(())
    }

    fn put_lib_rs(&self) -> GenResult<()> {
        let content = include_str!("templates/lib.rs.templated");
        let declarations = generate_lines_from_symbol!(
            port_getter_declaration_template!(),
            self.interface.ports
        );
        let trace_file = match &self.options.trace_file {
            Some(path) => format!("Some({:?})", path_str(path)?),
            None => "None".to_string(),
        };
        let content = content.replace("/*TOP*/", &self.interface.top_name);
        let content = content.replace("/*TRACE_FILE*/", &trace_file);
        let content = content.replace("    // TEMPLATED: port getter declarations", &declarations);
        let content = content.replace("    // TEMPLATED: port fields", &self.generate_rust_fields());
        let content = content.replace("        // TEMPLATED: port infos", &self.generate_port_infos());
        let content = content.replace(
            "                // TEMPLATED: port bindings",
            &self.generate_bindings(),
        );
        self.put_file("src/lib.rs", content.as_bytes())?;
        Ok(())
    }

    fn put_shim_h(&self) -> GenResult<()> {
        let content = include_str!("templates/shim.h.templated");
        let fields = self
            .interface
            .ports
            .iter()
            .map(|p| format!("  {} *{}{};", p.c_type(), p.name, p.c_dims()))
            .collect::<Vec<String>>()
            .join("\n");
        let content = content.replace("/*TOP*/", &self.interface.top_name);
        let content = content.replace("  // TEMPLATED: port fields", &fields);
        self.put_file("shim.h", content.as_bytes())?;
        Ok(())
    }

    fn generate_rust_fields(&self) -> String {
        self.interface
            .ports
            .iter()
            .map(|p| format!("    pub {}: {},", p.field_name(), p.field_type()))
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn generate_port_infos(&self) -> String {
        self.interface
            .ports
            .iter()
            .flat_map(|p| {
                let direction = direction_path(p.direction);
                p.leaves().into_iter().map(move |l| {
                    format!(
                        "        PortInfo::new(c\"{}\", {}, {direction}),",
                        l.name, p.width
                    )
                })
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn generate_bindings(&self) -> String {
        self.interface
            .ports
            .iter()
            .map(|p| {
                let symbols: Vec<String> = p.leaves().into_iter().map(|l| l.symbol).collect();
                format!(
                    "                {}: {},",
                    p.field_name(),
                    nested_binding(&symbols, &p.dims)
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn put_file(&self, file_name: &str, content: &[u8]) -> GenResult<()> {
        let file_path = self.temp_dir.path().join(file_name);
        let mut file = File::create_new(file_path)?;
        file.write_all(content)?;
        Ok(())
    }
}

/// Builds the (possibly nested) array expression binding one port field,
/// taking leaf symbols in row-major order.
fn nested_binding(symbols: &[String], dims: &[usize]) -> String {
    match dims.split_first() {
        None => format!("vshim_port_{}(model).cast()", symbols[0]),
        Some((dim, rest)) => {
            let chunk = symbols.len() / dim;
            let elements: Vec<String> = symbols
                .chunks(chunk)
                .map(|chunk| nested_binding(chunk, rest))
                .collect();
            format!("[{}]", elements.join(", "))
        }
    }
}

fn direction_path(direction: Direction) -> &'static str {
    match direction {
        Direction::In => "Direction::In",
        Direction::Out => "Direction::Out",
        Direction::InOut => "Direction::InOut",
    }
}

fn path_str(path: &Path) -> GenResult<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidPath(PathBuf::from(path)))
}
