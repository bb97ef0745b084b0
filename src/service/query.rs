//! Browse arguments: `cut`, `drilldown`, `page`, `page_size`, `order`.

use crate::error::AppError;
use std::collections::HashMap;

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

/// Restriction of one dimension to a path of level values, top-down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cut {
    pub dimension: String,
    pub path: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Paging {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Paging {
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrowseQuery {
    pub cuts: Vec<Cut>,
    pub drilldown: Vec<String>,
    pub paging: Paging,
    pub order: Option<Order>,
}

impl BrowseQuery {
    pub fn from_args(args: &HashMap<String, String>) -> Result<Self, AppError> {
        let cuts = match args.get("cut") {
            Some(s) => parse_cuts(s)?,
            None => Vec::new(),
        };
        let drilldown = args.get("drilldown").map(|s| parse_drilldown(s)).unwrap_or_default();
        let page = parse_number(args, "page")?.unwrap_or(0);
        let page_size = parse_number(args, "page_size")?
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let order = args.get("order").map(|s| parse_order(s)).transpose()?;
        Ok(BrowseQuery {
            cuts,
            drilldown,
            paging: Paging { page, page_size },
            order,
        })
    }

    /// Number of leading levels fixed by the cut on `dimension`.
    pub fn cut_depth(&self, dimension: &str) -> usize {
        self.cuts
            .iter()
            .filter(|c| c.dimension == dimension)
            .map(|c| c.path.len())
            .max()
            .unwrap_or(0)
    }
}

/// `date:2010,6|product:books` → two cuts. Empty parts are ignored.
pub fn parse_cuts(s: &str) -> Result<Vec<Cut>, AppError> {
    let mut cuts = Vec::new();
    for part in s.split('|').map(str::trim).filter(|p| !p.is_empty()) {
        let (dimension, path) = part
            .split_once(':')
            .ok_or_else(|| AppError::BadRequest(format!("cut '{}' must be dimension:path", part)))?;
        let dimension = dimension.trim();
        if dimension.is_empty() {
            return Err(AppError::BadRequest(format!("cut '{}' has no dimension", part)));
        }
        let path: Vec<String> = path.split(',').map(|v| v.trim().to_string()).collect();
        if path.iter().any(String::is_empty) {
            return Err(AppError::BadRequest(format!("cut '{}' has an empty path element", part)));
        }
        cuts.push(Cut {
            dimension: dimension.to_string(),
            path,
        });
    }
    Ok(cuts)
}

pub fn parse_drilldown(s: &str) -> Vec<String> {
    s.split(|c| c == ',' || c == '|')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_order(s: &str) -> Result<Order, AppError> {
    let (column, direction) = match s.rsplit_once(':') {
        Some((c, d)) => (c, Some(d)),
        None => (s, None),
    };
    let descending = match direction.map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "invalid order direction '{}'",
                other
            )))
        }
    };
    Ok(Order {
        column: column.to_string(),
        descending,
    })
}

fn parse_number(args: &HashMap<String, String>, key: &str) -> Result<Option<u32>, AppError> {
    args.get(key)
        .map(|v| {
            v.parse().map_err(|_| {
                AppError::BadRequest(format!(
                    "{} must be a non-negative integer, got '{}'",
                    key, v
                ))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn cuts_are_split_by_dimension_and_level() {
        let cuts = parse_cuts("date:2010,6|product:books").unwrap();
        assert_eq!(
            cuts,
            vec![
                Cut { dimension: "date".into(), path: vec!["2010".into(), "6".into()] },
                Cut { dimension: "product".into(), path: vec!["books".into()] },
            ]
        );
    }

    #[test]
    fn cut_without_colon_is_bad_request() {
        assert!(matches!(parse_cuts("date2010"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_cuts("date:2010,,6"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn defaults_without_args() {
        let q = BrowseQuery::from_args(&args(&[])).unwrap();
        assert_eq!(q, BrowseQuery::default());
        assert_eq!(q.paging.page_size, 100);
    }

    #[test]
    fn page_size_is_capped_and_offset_computed() {
        let q = BrowseQuery::from_args(&args(&[("page", "3"), ("page_size", "5000")])).unwrap();
        assert_eq!(q.paging.page_size, 1000);
        assert_eq!(q.paging.offset(), 3000);
    }

    #[test]
    fn non_numeric_page_is_bad_request() {
        assert!(BrowseQuery::from_args(&args(&[("page", "two")])).is_err());
    }

    #[test]
    fn order_direction_parsing() {
        let q = BrowseQuery::from_args(&args(&[("order", "date.year:desc")])).unwrap();
        assert_eq!(q.order, Some(Order { column: "date.year".into(), descending: true }));
        assert!(BrowseQuery::from_args(&args(&[("order", "amount:sideways")])).is_err());
    }

    #[test]
    fn cut_depth_uses_longest_path() {
        let q = BrowseQuery::from_args(&args(&[
            ("cut", "date:2010|date:2010,6"),
            ("drilldown", "date, product"),
        ]))
        .unwrap();
        assert_eq!(q.cut_depth("date"), 2);
        assert_eq!(q.cut_depth("product"), 0);
        assert_eq!(q.drilldown, ["date", "product"]);
    }
}
