//! Driver to SQL-builder dialect resolution.

use serde::{Deserialize, Serialize};

/// The closed set of database drivers a builder request may carry.
///
/// `Unspecified` is the wire-format zero value; it never reaches this module
/// in a validated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Driver {
    #[default]
    Unspecified,
    Doris,
    Mysql,
    Postgres,
}

/// A SQL-builder configuration profile: how the generated statement quotes
/// identifiers and writes bind placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Mysql,
    Postgres,
}

impl Dialect {
    /// Quotes an identifier for this dialect.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// The bind placeholder for 1-based parameter position `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Mysql => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }
}

/// Resolves a driver to its builder dialect. Doris speaks the MySQL wire
/// dialect and shares its profile.
///
/// # Panics
///
/// Panics on [`Driver::Unspecified`]. Requests are validated before they
/// reach builder construction, so an unmapped driver here is a programming
/// error, not an input error.
pub fn dialect(driver: Driver) -> Dialect {
    match driver {
        Driver::Doris | Driver::Mysql => Dialect::Mysql,
        Driver::Postgres => Dialect::Postgres,
        Driver::Unspecified => {
            panic!("no SQL dialect mapped for driver {driver:?}; request was not validated")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doris_and_mysql_share_a_profile() {
        let doris = dialect(Driver::Doris);
        let mysql = dialect(Driver::Mysql);
        assert_eq!(doris, mysql);
        assert_eq!(doris.quote("order"), mysql.quote("order"));
        assert_eq!(doris.placeholder(3), mysql.placeholder(3));
    }

    #[test]
    fn test_postgres_profile() {
        let pg = dialect(Driver::Postgres);
        assert_eq!(pg.quote("order"), "\"order\"");
        assert_eq!(pg.placeholder(2), "$2");
    }

    #[test]
    fn test_mysql_quoting_and_placeholders() {
        let my = dialect(Driver::Mysql);
        assert_eq!(my.quote("order"), "`order`");
        assert_eq!(my.quote("we`ird"), "`we``ird`");
        assert_eq!(my.placeholder(5), "?");
    }

    #[test]
    #[should_panic(expected = "no SQL dialect mapped")]
    fn test_unspecified_driver_aborts() {
        dialect(Driver::Unspecified);
    }

    #[test]
    fn test_driver_wire_names() {
        assert_eq!(
            serde_json::to_string(&Driver::Postgres).unwrap(),
            "\"POSTGRES\""
        );
        let d: Driver = serde_json::from_str("\"DORIS\"").unwrap();
        assert_eq!(d, Driver::Doris);
    }
}
