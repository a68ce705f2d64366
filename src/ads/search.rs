use sqlx::{Postgres, QueryBuilder};

use super::repo_types::SearchFilter;

/// Projection shared by every ad read path. Expects `advertisements a`
/// joined with `users u`.
pub(crate) const AD_COLUMNS: &str = r#"
    a.id, a.user_id, u.telegram_id, u.name AS owner_name, u.phone AS owner_phone,
    a.title, a.description, a.price, a.photos_urls, a.address, a.archived,
    a.created_at, a.updated_at
"#;

/// Builds the search statement. User input only ever reaches the query
/// through `push_bind`.
pub(crate) fn search_query(filter: &SearchFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT");
    qb.push(AD_COLUMNS);
    qb.push(
        " FROM advertisements a JOIN users u ON u.id = a.user_id WHERE a.archived = FALSE",
    );

    let keyword = filter.keyword.as_str();
    if !keyword.is_empty() {
        qb.push(" AND a.title ILIKE ");
        qb.push_bind(format!("%{}%", escape_like(keyword)));
    }
    if filter.max_price > 0 {
        qb.push(" AND a.price <= ");
        qb.push_bind(filter.max_price);
    }
    qb.push(" ORDER BY a.created_at DESC, a.id DESC");
    qb
}

/// Escapes LIKE wildcards so the keyword matches as a literal substring.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
