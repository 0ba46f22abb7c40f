//! Product listing filters and pagination.
//!
//! The listing page keeps its whole filter state in the URL query string so
//! links are shareable and the back button works. [`ProductFilter`] parses that
//! query, builds the parameters for the backend list endpoint, and produces
//! the links for filter changes and page navigation. Any filter change resets
//! the page to 1; only page links carry a page number.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::types::Price;

/// Default number of products per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Upper bound on requested page sizes.
pub const MAX_PAGE_SIZE: u32 = 60;

/// Field the listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    Price,
    Name,
    BestSelling,
    Rating,
}

impl SortKey {
    /// Value of the backend `sort` parameter.
    #[must_use]
    pub const fn as_param(&self) -> &'static str {
        match self {
            Self::Newest => "createdAt",
            Self::Price => "price",
            Self::Name => "name",
            Self::BestSelling => "sold",
            Self::Rating => "rating",
        }
    }

    /// Value used in storefront URLs.
    #[must_use]
    pub const fn as_slug(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Price => "price",
            Self::Name => "name",
            Self::BestSelling => "best_selling",
            Self::Rating => "rating",
        }
    }

    fn from_slug(s: &str) -> Option<Self> {
        match s {
            "newest" => Some(Self::Newest),
            "price" => Some(Self::Price),
            "name" => Some(Self::Name),
            "best_selling" => Some(Self::BestSelling),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }

    /// Natural direction when the customer picks this key.
    #[must_use]
    pub const fn default_order(&self) -> SortOrder {
        match self {
            Self::Price | Self::Name => SortOrder::Asc,
            Self::Newest | Self::BestSelling | Self::Rating => SortOrder::Desc,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_param(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Raw listing query string, as axum's `Query` extractor sees it.
///
/// Multi-valued fields are comma-separated: `brand=yonex,victor` and
/// `attrs=weight:4U,balance:head-heavy`. Each item is percent-encoded on its
/// own, so a value holding `,` or `:` survives the trip through a link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub attrs: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
}

/// Parsed filter state of the product listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    /// Brand slugs, de-duplicated, in the order first seen.
    pub brands: Vec<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    /// `(attribute, value)` pairs such as `("weight", "4U")`.
    pub attributes: Vec<(String, String)>,
    pub sort: SortKey,
    pub order: SortOrder,
    /// 1-based page number.
    pub page: u32,
}

impl ProductFilter {
    /// Parse a listing query, dropping anything malformed instead of failing.
    ///
    /// Swapped price bounds are put back in order.
    #[must_use]
    pub fn from_query(query: &ListingQuery) -> Self {
        let search = non_empty(query.q.as_deref());
        let category = non_empty(query.category.as_deref());

        let mut brands: Vec<String> = Vec::new();
        for brand in split_list(query.brand.as_deref()) {
            let brand = decode_item(brand).to_lowercase();
            if !brands.contains(&brand) {
                brands.push(brand);
            }
        }

        let attributes = split_list(query.attrs.as_deref())
            .filter_map(|pair| {
                let (name, value) = pair.split_once(':')?;
                let (name, value) = (decode_item(name.trim()), decode_item(value.trim()));
                (!name.is_empty() && !value.is_empty())
                    .then(|| (name.to_lowercase(), value.into_owned()))
            })
            .collect();

        let mut min_price = parse_price(query.min_price.as_deref());
        let mut max_price = parse_price(query.max_price.as_deref());
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            (min_price, max_price) = (Some(max), Some(min));
        }

        let sort = query
            .sort
            .as_deref()
            .and_then(SortKey::from_slug)
            .unwrap_or_default();
        let order = match query.order.as_deref() {
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            _ => sort.default_order(),
        };

        let page = query
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);

        Self {
            search,
            category,
            brands,
            min_price,
            max_price,
            attributes,
            sort,
            order,
            page,
        }
    }

    /// Whether any narrowing filter (not sort or page) is active.
    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        self.search.is_some()
            || self.category.is_some()
            || !self.brands.is_empty()
            || self.min_price.is_some()
            || self.max_price.is_some()
            || !self.attributes.is_empty()
    }

    /// Whether `brand` is currently selected.
    #[must_use]
    pub fn has_brand(&self, brand: &str) -> bool {
        self.brands.iter().any(|b| b.eq_ignore_ascii_case(brand))
    }

    /// Parameters for the backend list endpoint, in a stable order.
    #[must_use]
    pub fn to_backend_query(&self, page_size: u32) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            (
                "limit".to_string(),
                page_size.clamp(1, MAX_PAGE_SIZE).to_string(),
            ),
        ];
        if let Some(search) = &self.search {
            params.push(("search".to_string(), search.clone()));
        }
        if let Some(category) = &self.category {
            params.push(("category".to_string(), category.clone()));
        }
        if !self.brands.is_empty() {
            params.push(("brand".to_string(), self.brands.join(",")));
        }
        if let Some(min) = self.min_price {
            params.push(("minPrice".to_string(), min.to_dong().to_string()));
        }
        if let Some(max) = self.max_price {
            params.push(("maxPrice".to_string(), max.to_dong().to_string()));
        }
        for (name, value) in &self.attributes {
            params.push((format!("attr.{name}"), value.clone()));
        }
        params.push(("sort".to_string(), self.sort.as_param().to_string()));
        params.push(("order".to_string(), self.order.as_param().to_string()));
        params
    }

    /// Storefront query pairs for this filter state, page included if > 1.
    #[must_use]
    pub fn url_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("q", search.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if !self.brands.is_empty() {
            let brands = self
                .brands
                .iter()
                .map(|b| urlencoding::encode(b))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("brand", brands));
        }
        if let Some(min) = self.min_price {
            pairs.push(("min_price", min.to_dong().to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("max_price", max.to_dong().to_string()));
        }
        if !self.attributes.is_empty() {
            let attrs = self
                .attributes
                .iter()
                .map(|(n, v)| format!("{}:{}", urlencoding::encode(n), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("attrs", attrs));
        }
        if self.sort != SortKey::default() || self.order != self.sort.default_order() {
            pairs.push(("sort", self.sort.as_slug().to_string()));
            pairs.push(("order", self.order.as_param().to_string()));
        }
        if self.page > 1 {
            pairs.push(("page", self.page.to_string()));
        }
        pairs
    }

    /// Storefront URL for this filter state (including the page, if > 1).
    #[must_use]
    pub fn href(&self) -> String {
        let query = self
            .url_pairs()
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            "/products".to_string()
        } else {
            format!("/products?{query}")
        }
    }

    /// Link to page `page` with the current filters.
    #[must_use]
    pub fn href_for_page(&self, page: u32) -> String {
        Self {
            page: page.max(1),
            ..self.clone()
        }
        .href()
    }

    /// Copy of this filter with a different sort, back on page 1.
    #[must_use]
    pub fn with_sort(&self, sort: SortKey, order: SortOrder) -> Self {
        Self {
            sort,
            order,
            page: 1,
            ..self.clone()
        }
    }

    /// Copy with `brand` added or removed, back on page 1.
    #[must_use]
    pub fn toggle_brand(&self, brand: &str) -> Self {
        let brand = brand.to_lowercase();
        let mut next = Self {
            page: 1,
            ..self.clone()
        };
        if let Some(pos) = next.brands.iter().position(|b| *b == brand) {
            next.brands.remove(pos);
        } else {
            next.brands.push(brand);
        }
        next
    }

    /// Copy with a new price range, back on page 1.
    #[must_use]
    pub fn with_price_range(&self, min: Option<Price>, max: Option<Price>) -> Self {
        Self {
            min_price: min,
            max_price: max,
            page: 1,
            ..self.clone()
        }
    }

    /// Copy with a category selected (or cleared), back on page 1.
    #[must_use]
    pub fn with_category(&self, category: Option<&str>) -> Self {
        Self {
            category: category.map(str::to_string),
            page: 1,
            ..self.clone()
        }
    }

    /// Copy with all narrowing filters removed; keeps the sort.
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self {
            sort: self.sort,
            order: self.order,
            page: 1,
            ..Self::default()
        }
    }
}

/// Pagination metadata as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// One page of results plus navigation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    /// Wrap a page the backend already sliced. The page number is clamped
    /// into `1..=total_pages`.
    #[must_use]
    pub fn from_server(items: Vec<T>, meta: PageMeta) -> Self {
        let total_pages = meta.total_pages.max(1);
        Self {
            items,
            page: meta.page.clamp(1, total_pages),
            total_pages,
            total_items: meta.total,
        }
    }

    /// Slice a full result set locally. Out-of-range pages clamp to the last page.
    #[must_use]
    pub fn paginate_local(items: Vec<T>, page: u32, per_page: u32) -> Self {
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE) as usize;
        let total_items = items.len();
        let total_pages = total_items.div_ceil(per_page).max(1);
        let page = (page.max(1) as usize).min(total_pages);
        let start = (page - 1) * per_page;

        let items = items.into_iter().skip(start).take(per_page).collect();

        Self {
            items,
            page: u32::try_from(page).unwrap_or(u32::MAX),
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            total_items: total_items as u64,
        }
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Page numbers to render, at most `window` around the current page.
    #[must_use]
    pub fn page_window(&self, window: u32) -> Vec<u32> {
        let half = window / 2;
        let start = self.page.saturating_sub(half).max(1);
        let end = start
            .saturating_add(window.saturating_sub(1))
            .min(self.total_pages);
        let start = end.saturating_sub(window.saturating_sub(1)).max(1);
        (start..=end).collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_price(value: Option<&str>) -> Option<Price> {
    let digits: String = value?.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<i64>().ok().map(Price::from_dong)
}

/// Undo the per-item encoding of list values; malformed escapes stay as typed.
fn decode_item(item: &str) -> Cow<'_, str> {
    urlencoding::decode(item).unwrap_or(Cow::Borrowed(item))
}
