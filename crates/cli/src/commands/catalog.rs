//! Catalog browsing commands.

use clap::Args;
use rust_decimal::Decimal;
use storefront_sync_core::{Category, ProductFilter, SortKey};

use super::{CliError, connect};

/// Catalog filter flags. Flags override values from `--query`.
#[derive(Debug, Default, Args)]
pub struct FilterArgs {
    /// Filter query string, as found in a catalog URL
    #[arg(long)]
    query: Option<String>,

    /// Free-text search
    #[arg(short, long)]
    search: Option<String>,

    /// Category slug
    #[arg(long)]
    category: Option<String>,

    /// Sub-category slug
    #[arg(long)]
    sub_category: Option<String>,

    /// Brand name
    #[arg(long)]
    brand: Option<String>,

    /// Color name
    #[arg(long)]
    color: Option<String>,

    /// Size label
    #[arg(long)]
    size: Option<String>,

    /// Minimum price
    #[arg(long)]
    min_price: Option<Decimal>,

    /// Maximum price
    #[arg(long)]
    max_price: Option<Decimal>,

    /// Sort order (`newest`, `price_asc`, `price_desc`, `rating`, `popularity`)
    #[arg(long)]
    sort: Option<SortKey>,

    /// Only new arrivals
    #[arg(long)]
    new: bool,

    /// Only trending products
    #[arg(long)]
    trending: bool,

    /// Only products on sale
    #[arg(long)]
    on_sale: bool,

    /// Products per page
    #[arg(long)]
    page_size: Option<u32>,
}

impl FilterArgs {
    fn apply(self, filter: &mut ProductFilter) {
        macro_rules! set {
            ($($field:ident => $target:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    filter.$target = Some(value);
                })*
            };
        }
        set!(
            search => search,
            category => category,
            sub_category => sub_category,
            brand => brand,
            color => color,
            size => size,
            min_price => min_price,
            max_price => max_price,
            sort => sort_by,
            page_size => page_size,
        );
        if self.new {
            filter.is_new = Some(true);
        }
        if self.trending {
            filter.is_trending = Some(true);
        }
        if self.on_sale {
            filter.is_on_sale = Some(true);
        }
    }
}

/// Load `pages` catalog pages and print them.
#[allow(clippy::print_stdout)]
pub async fn products(mut args: FilterArgs, pages: u32) -> Result<(), CliError> {
    let storefront = connect(false).await?;
    if let Some(query) = args.query.take() {
        storefront.hydrate_filter_from_query(&query).await;
    }

    let query = storefront.apply_filter(|f| args.apply(f)).await?;
    tracing::debug!(%query, "Filter applied");
    for _ in 1..pages.max(1) {
        if !storefront.load_next_page().await? {
            break;
        }
    }

    storefront
        .store()
        .read(|s| {
            for product in s.products.products() {
                let stock = if product.in_stock() { "" } else { "  (sold out)" };
                println!(
                    "{:<12} {:<40} {:>10}{stock}",
                    product.id.as_str(),
                    product.name,
                    product.effective_price()
                );
            }
            println!(
                "{} of {} products",
                s.products.len(),
                s.products.total_count()
            );
        })
        .await;
    Ok(())
}

/// Print one product.
#[allow(clippy::print_stdout)]
pub async fn product(slug: &str) -> Result<(), CliError> {
    let storefront = connect(false).await?;
    let product = storefront.view_product(slug).await?;

    println!("{} ({})", product.name, product.brand);
    println!("  id:    {}", product.id);
    println!("  price: {}", product.effective_price());
    if let Some(rating) = &product.rating {
        println!("  rating: {:.1} ({} reviews)", rating.average, rating.count);
    }
    for color in &product.colors {
        let sizes: Vec<String> = color
            .sizes
            .iter()
            .map(|s| format!("{}:{}", s.size, s.stock))
            .collect();
        println!("  {:<10} {}", color.color, sizes.join(" "));
    }
    Ok(())
}

/// Print the category tree.
#[allow(clippy::print_stdout)]
pub async fn categories() -> Result<(), CliError> {
    fn print(category: &Category, depth: usize) {
        println!("{:indent$}{} ({})", "", category.name, category.slug, indent = depth * 2);
        for child in &category.sub_categories {
            print(child, depth + 1);
        }
    }

    let storefront = connect(false).await?;
    for category in storefront.load_categories().await? {
        print(&category, 0);
    }
    Ok(())
}
