use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// sort by `field`: `id`, `name`, `path` or the name of a user property
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: SortDirection,
}

impl Order {
    pub fn asc<S: ToString>(field: S) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc<S: ToString>(field: S) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Descending,
        }
    }
}

/// Which window of a result to return and in what order.
///
/// An unlimited pager (`page_size == None`) returns everything as page 0.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub struct Pager {
    pub page_index: usize,
    pub page_size: Option<usize>,
    pub order: Vec<Order>,
}

impl Pager {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index,
            page_size: Some(page_size),
            order: vec![],
        }
    }

    pub fn ordered_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn is_limited(&self) -> bool {
        self.page_size.is_some()
    }

    /// the pager for the page after this one
    pub fn next(&self) -> Self {
        Self {
            page_index: self.page_index + 1,
            page_size: self.page_size,
            order: self.order.clone(),
        }
    }

    /// caps the page size at `max`; a zero page size is raised to one
    pub fn clamped(mut self, max: usize) -> Self {
        if let Some(size) = self.page_size {
            self.page_size = Some(size.clamp(1, max.max(1)));
        }
        self
    }

    /// index of the first item of this page
    pub fn start(&self) -> usize {
        match self.page_size {
            None => 0,
            Some(size) => self.page_index.saturating_mul(size),
        }
    }

    /// the index range of this page within a result of `total` items
    pub fn window(&self, total: usize) -> std::ops::Range<usize> {
        match self.page_size {
            None if self.page_index == 0 => 0..total,
            None => total..total,
            Some(size) => {
                let start = self.start().min(total);
                let end = start.saturating_add(size).min(total);
                start..end
            }
        }
    }

    pub fn last_page_index(&self, total: usize) -> usize {
        match self.page_size {
            Some(size) if total > 0 && size > 0 => (total - 1) / size,
            _ => 0,
        }
    }
}

/// One window of a result together with the size of the whole result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pager: Pager,
    pub total_size: usize,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.pager.page_index >= self.pager.last_page_index(self.total_size)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pager: self.pager,
            total_size: self.total_size,
        }
    }
}

/// Orders sort keys: missing values last, numbers numerically, everything else by its text.
pub fn compare_values(a: &Option<Value>, b: &Option<Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

/// compares two rows of sort keys, one key per entry of `order`
pub fn compare_rows(order: &[Order], a: &[Option<Value>], b: &[Option<Value>]) -> Ordering {
    for (index, o) in order.iter().enumerate() {
        let (x, y) = match (a.get(index), b.get(index)) {
            (Some(x), Some(y)) => (x, y),
            _ => break,
        };
        let cmp = match o.direction {
            SortDirection::Ascending => compare_values(x, y),
            SortDirection::Descending => compare_values(y, x),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
pub mod test {
    use crate::hyperspace::registry::page::{compare_rows, Order, Page, Pager};
    use proptest::prelude::*;
    use serde_json::json;
    use std::cmp::Ordering;

    #[test]
    pub fn test_windows() {
        let pager = Pager::new(2, 10);
        assert_eq!(pager.window(25), 20..25);
        assert_eq!(pager.window(15), 15..15);
        assert_eq!(pager.last_page_index(25), 2);
        assert_eq!(pager.last_page_index(20), 1);
        assert_eq!(pager.last_page_index(0), 0);
        assert_eq!(Pager::none().window(7), 0..7);
        assert_eq!(Pager::new(0, 5000).clamped(1000).page_size, Some(1000));

        let page = Page {
            items: vec![1, 2, 3],
            pager: Pager::new(1, 3),
            total_size: 6,
        };
        assert!(page.is_last());
    }

    #[test]
    pub fn test_rows() {
        let order = vec![Order::asc("name"), Order::desc("size")];
        let a = vec![Some(json!("a")), Some(json!(1))];
        let b = vec![Some(json!("a")), Some(json!(2))];
        let c = vec![None, Some(json!(3))];
        assert_eq!(compare_rows(&order, &a, &b), Ordering::Greater);
        assert_eq!(compare_rows(&order, &a, &c), Ordering::Less);
    }

    proptest! {
        #[test]
        fn pages_add_up_to_the_total(total in 0usize..500, size in 1usize..60) {
            let mut sum = 0;
            let mut pager = Pager::new(0, size);
            let last = pager.last_page_index(total);
            loop {
                sum += pager.window(total).len();
                if pager.page_index >= last {
                    break;
                }
                pager = pager.next();
            }
            prop_assert_eq!(sum, total);
            prop_assert_eq!(pager.window(total).end, total);
        }
    }
}
