use vshim_rs::Direction;

use crate::{Error, GenResult};

/// Everything the generator needs to know about one verilated model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInterface {
    pub top_name: String,
    pub ports: Vec<PortDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortDecl {
    pub name: String,
    pub width: u32,
    pub dims: Vec<usize>,
    pub direction: Direction,
}

/// One storage location of a port; array ports have one per element.
#[derive(Clone, Debug, PartialEq)]
pub struct Leaf {
    /// Name reported through the port query, e.g. `mem[1][0]`.
    pub name: String,
    /// Suffix of the glue getter, e.g. `mem__1__0`.
    pub symbol: String,
    /// C++ member access, e.g. `mem[1][0]`.
    pub access: String,
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true",
    "try", "type", "unsafe", "use", "where", "while", "yield",
];

impl PortDecl {
    /// Rust type of the port storage inside the model.
    pub fn rust_type(&self) -> String {
        match self.width {
            0..=8 => "u8".to_string(),
            9..=16 => "u16".to_string(),
            17..=32 => "u32".to_string(),
            33..=64 => "u64".to_string(),
            _ => format!("[u32; {}]", vshim_rs::port::num_of_words(self.width)),
        }
    }

    /// C type of one port pointer, as a CFFI host declares it.
    pub fn c_type(&self) -> &'static str {
        match self.width {
            0..=8 => "unsigned char",
            9..=16 => "unsigned short",
            17..=32 => "unsigned int",
            33..=64 => "unsigned long",
            _ => "unsigned int",
        }
    }

    pub fn field_name(&self) -> String {
        if RUST_KEYWORDS.contains(&self.name.as_str()) {
            format!("{}_", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Field type in the port struct: a pointer, nested in arrays for
    /// unpacked dimensions.
    pub fn field_type(&self) -> String {
        self.dims
            .iter()
            .rev()
            .fold(format!("*mut {}", self.rust_type()), |inner, dim| {
                format!("[{inner}; {dim}]")
            })
    }

    pub fn c_dims(&self) -> String {
        self.dims.iter().map(|d| format!("[{d}]")).collect()
    }

    pub fn leaves(&self) -> Vec<Leaf> {
        let mut indices: Vec<Vec<usize>> = vec![vec![]];
        for dim in self.dims.iter() {
            indices = indices
                .into_iter()
                .flat_map(|prefix| {
                    (0..*dim).map(move |i| {
                        let mut index = prefix.clone();
                        index.push(i);
                        index
                    })
                })
                .collect();
        }
        indices
            .into_iter()
            .map(|index| {
                let subscripts: String = index.iter().map(|i| format!("[{i}]")).collect();
                let suffix: String = index.iter().map(|i| format!("__{i}")).collect();
                Leaf {
                    name: format!("{}{subscripts}", self.name),
                    symbol: format!("{}{suffix}", self.name),
                    access: format!("{}{subscripts}", self.name),
                }
            })
            .collect()
    }
}

/// Enumerates the ports of a verilated model from its `V<top>.h` header.
///
/// Port declarations look like `VL_IN8(&clk,0,0);` or
/// `VL_OUTW(&data,69,0,3);`; older Verilator releases omit the `&`.
pub fn parse_ports(top_name: &str, header: &str) -> GenResult<ModelInterface> {
    let mut ports = vec![];
    for line in header.lines().map(str::trim) {
        if let Some(port) = parse_port_line(line)? {
            ports.push(port);
        }
    }
    if ports.is_empty() {
        return Err(Error::NoPorts(top_name.to_string()));
    }
    Ok(ModelInterface {
        top_name: top_name.to_string(),
        ports,
    })
}

fn parse_port_line(line: &str) -> GenResult<Option<PortDecl>> {
    let Some(rest) = line.strip_prefix("VL_") else {
        return Ok(None);
    };
    let Some((macro_name, args)) = rest.split_once('(') else {
        return Ok(None);
    };
    let Some(direction) = macro_direction(macro_name) else {
        return Ok(None);
    };
    let args = args
        .trim_end_matches(';')
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| Error::PortDecl(line.to_string()))?;
    let args: Vec<&str> = args.split(',').map(str::trim).collect();
    if args.len() < 3 {
        return Err(Error::PortDecl(line.to_string()));
    }
    let (name, dims) = parse_declarator(args[0]).ok_or_else(|| Error::PortDecl(line.to_string()))?;
    let msb: u32 = args[1].parse().map_err(|_| Error::PortDecl(line.to_string()))?;
    let lsb: u32 = args[2].parse().map_err(|_| Error::PortDecl(line.to_string()))?;
    if msb < lsb {
        return Err(Error::PortDecl(line.to_string()));
    }
    Ok(Some(PortDecl {
        name,
        width: msb - lsb + 1,
        dims,
        direction,
    }))
}

fn macro_direction(macro_name: &str) -> Option<Direction> {
    let (direction, size) = if let Some(size) = macro_name.strip_prefix("INOUT") {
        (Direction::InOut, size)
    } else if let Some(size) = macro_name.strip_prefix("OUT") {
        (Direction::Out, size)
    } else if let Some(size) = macro_name.strip_prefix("IN") {
        (Direction::In, size)
    } else {
        return None;
    };
    matches!(size, "" | "8" | "16" | "64" | "W").then_some(direction)
}

fn parse_declarator(declarator: &str) -> Option<(String, Vec<usize>)> {
    let declarator = declarator.trim_start_matches('&');
    let (name, mut rest) = match declarator.find('[') {
        Some(index) => declarator.split_at(index),
        None => (declarator, ""),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let mut dims = vec![];
    while let Some(inner) = rest.strip_prefix('[') {
        let (dim, tail) = inner.split_once(']')?;
        let dim: usize = dim.trim().parse().ok()?;
        if dim == 0 {
            return None;
        }
        dims.push(dim);
        rest = tail;
    }
    rest.is_empty().then(|| (name.to_string(), dims))
}

#[cfg(test)]
mod test {
    use vshim_rs::Direction;

    use super::{parse_ports, PortDecl};
    use crate::Error;

    const HEADER: &str = r#"
// Verilated -*- C++ -*-
#ifndef VERILATED_VSAMPLE_H_
#define VERILATED_VSAMPLE_H_

class alignas(VL_CACHE_LINE_BYTES) Vsample VL_NOT_FINAL : public VerilatedModel {
  public:
    VL_IN8(&clk,0,0);
    VL_IN8(&rst_n,0,0);
    VL_IN8(&in,5,0);
    VL_OUT8(&out,5,0);
    VL_IN16(&half,15,0);
    VL_OUT(&word,31,0);
    VL_IN64(&quad,39,0);
    VL_OUTW(&wide,69,0,3);
    VL_INOUT8(&bus,3,0);
    VL_IN8(mem[2][3],7,0);
    VL_INLINE_OPT void eval();
    Vsample* rootp;
};
#endif
"#;

    fn port(name: &str, width: u32, dims: Vec<usize>, direction: Direction) -> PortDecl {
        PortDecl {
            name: name.to_string(),
            width,
            dims,
            direction,
        }
    }

    #[test]
    fn test_parse_ports() {
        let interface = parse_ports("sample", HEADER).unwrap();
        assert_eq!(interface.top_name, "sample");
        assert_eq!(
            interface.ports,
            vec![
                port("clk", 1, vec![], Direction::In),
                port("rst_n", 1, vec![], Direction::In),
                port("in", 6, vec![], Direction::In),
                port("out", 6, vec![], Direction::Out),
                port("half", 16, vec![], Direction::In),
                port("word", 32, vec![], Direction::Out),
                port("quad", 40, vec![], Direction::In),
                port("wide", 70, vec![], Direction::Out),
                port("bus", 4, vec![], Direction::InOut),
                port("mem", 8, vec![2, 3], Direction::In),
            ]
        );
    }

    #[test]
    fn test_parse_without_address_of() {
        let interface = parse_ports("old", "  VL_IN8(clk,0,0);\n  VL_OUT16(q,11,0);").unwrap();
        assert_eq!(interface.ports[0], port("clk", 1, vec![], Direction::In));
        assert_eq!(interface.ports[1], port("q", 12, vec![], Direction::Out));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_ports("empty", "class Vempty {};"),
            Err(Error::NoPorts(_))
        ));
        assert!(matches!(
            parse_ports("bad", "VL_IN8(&clk,zero,0);"),
            Err(Error::PortDecl(_))
        ));
        assert!(matches!(
            parse_ports("bad", "VL_IN8(&clk,0,1);"),
            Err(Error::PortDecl(_))
        ));
        assert!(matches!(
            parse_ports("bad", "VL_IN8(mem[2][0],7,0);"),
            Err(Error::PortDecl(_))
        ));
    }

    #[test]
    fn test_types() {
        assert_eq!(port("a", 1, vec![], Direction::In).rust_type(), "u8");
        assert_eq!(port("a", 16, vec![], Direction::In).rust_type(), "u16");
        assert_eq!(port("a", 17, vec![], Direction::In).rust_type(), "u32");
        assert_eq!(port("a", 64, vec![], Direction::In).rust_type(), "u64");
        assert_eq!(port("a", 70, vec![], Direction::In).rust_type(), "[u32; 3]");
        assert_eq!(port("a", 40, vec![], Direction::In).c_type(), "unsigned long");
        assert_eq!(port("a", 70, vec![], Direction::In).c_type(), "unsigned int");
        assert_eq!(
            port("mem", 8, vec![2, 3], Direction::In).field_type(),
            "[[*mut u8; 3]; 2]"
        );
        assert_eq!(port("mem", 8, vec![2, 3], Direction::In).c_dims(), "[2][3]");
        assert_eq!(port("in", 1, vec![], Direction::In).field_name(), "in_");
        assert_eq!(port("clk", 1, vec![], Direction::In).field_name(), "clk");
    }

    #[test]
    fn test_leaves() {
        let scalar = port("clk", 1, vec![], Direction::In).leaves();
        assert_eq!(scalar.len(), 1);
        assert_eq!(scalar[0].name, "clk");
        assert_eq!(scalar[0].symbol, "clk");

        let leaves = port("mem", 8, vec![2, 3], Direction::In).leaves();
        let names: Vec<&str> = leaves.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            ["mem[0][0]", "mem[0][1]", "mem[0][2]", "mem[1][0]", "mem[1][1]", "mem[1][2]"]
        );
        assert_eq!(leaves[4].symbol, "mem__1__1");
        assert_eq!(leaves[4].access, "mem[1][1]");
    }
}
