use std::collections::BTreeSet;

/// Dashboard pages and the module that gates each of them.
const PAGE_MODULES: &[(&str, &str)] = &[
    ("quality.html", "quality"),
    ("quality-control.html", "quality"),
    ("design.html", "design"),
    ("design-review.html", "design"),
    ("production.html", "production"),
    ("production-tracking.html", "production"),
    ("parameters.html", "parameters"),
    ("users.html", "users"),
];

/// Module id for a page. Unmapped pages are gated by their own file name.
pub fn module_for_page(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    PAGE_MODULES
        .iter()
        .find(|(page, _)| *page == file)
        .map(|(_, module)| module.to_string())
        .unwrap_or_else(|| file.to_string())
}

/// Every module id named by a mapped page.
pub fn known_modules() -> impl Iterator<Item = &'static str> {
    PAGE_MODULES
        .iter()
        .map(|(_, module)| *module)
        .collect::<BTreeSet<_>>()
        .into_iter()
}
