use serde::Deserialize;

/// One page of a list endpoint.
///
/// Paginated endpoints answer `{count, next, previous, results}`; plain
/// lists are accepted too and read as a single complete page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "PageOrList<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageOrList<T> {
    List(Vec<T>),
    Page {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
}

impl<T> From<PageOrList<T>> for Page<T> {
    fn from(raw: PageOrList<T>) -> Self {
        match raw {
            PageOrList::Page {
                count,
                next,
                previous,
                results,
            } => Page {
                count: count.unwrap_or(results.len() as u64),
                next,
                previous,
                results,
            },
            PageOrList::List(results) => Page {
                count: results.len() as u64,
                next: None,
                previous: None,
                results,
            },
        }
    }
}
