//! Standard library selection
//!
//! Language primitives (stack shuffles, arithmetic, comparison, control
//! flow, table construction and access) are always available. Everything
//! else is grouped into libraries a host opens explicitly.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Libs: u32 {
        /// `error`, `type`, `tostring`, `tonumber`, `get-global`, `set-global`
        const BASE = 1 << 0;
        /// `abs`, `floor`, `ceil`, `min`, `max`, `sqrt`
        const MATH = 1 << 1;
        /// `upper`, `lower`, `string-length`, `rep`, `substr`
        const STRING = 1 << 2;
        /// `table-append`, `table-remove`, `each`
        const TABLE = 1 << 3;
        /// `print`
        const IO = 1 << 4;
        const ALL = Self::BASE.bits()
            | Self::MATH.bits()
            | Self::STRING.bits()
            | Self::TABLE.bits()
            | Self::IO.bits();
    }
}

impl Libs {
    /// Library for a configuration name (`base`, `math`, `string`, `table`, `io`, `all`)
    pub fn from_lib_name(name: &str) -> Option<Libs> {
        match name.to_ascii_lowercase().as_str() {
            "base" => Some(Libs::BASE),
            "math" => Some(Libs::MATH),
            "string" => Some(Libs::STRING),
            "table" => Some(Libs::TABLE),
            "io" => Some(Libs::IO),
            "all" => Some(Libs::ALL),
            _ => None,
        }
    }

    /// Union of the named libraries
    pub fn from_names<I, S>(names: I) -> Result<Libs, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Libs::empty(), |acc, name| {
            let name = name.as_ref();
            Libs::from_lib_name(name)
                .map(|lib| acc | lib)
                .ok_or_else(|| format!("Unknown library '{}'", name))
        })
    }
}
