//! Catalog commands.

use renomarket_client::Marketplace;
use renomarket_client::models::{ListQuery, Listing};
use renomarket_core::{ArticleId, ProductId, ProjectId};

use super::CliError;

pub async fn products(market: &Marketplace, query: &ListQuery) -> Result<(), CliError> {
    let listing = market.catalog().products(query).await?;
    print_listing(&listing, |p| {
        let stock = if p.in_stock() { "" } else { " (rupture)" };
        format!("{:<12} {:<40} {}{stock}", p.id.as_str(), p.name, p.price)
    });
    Ok(())
}

pub async fn product(market: &Marketplace, id: &str) -> Result<(), CliError> {
    let product = market.catalog().product(&ProductId::new(id)).await?;
    println!("{} - {}", product.name, product.price);
    if let Some(brand) = &product.brand {
        println!("Marque : {brand}");
    }
    if let Some(stock) = product.stock {
        println!("Stock : {stock}");
    }
    if !product.description.is_empty() {
        println!("\n{}", product.description);
    }
    Ok(())
}

pub async fn projects(market: &Marketplace, query: &ListQuery) -> Result<(), CliError> {
    let listing = market.catalog().projects(query).await?;
    print_listing(&listing, |p| {
        format!(
            "{:<12} {:<40} {}",
            p.id.as_str(),
            p.title,
            p.location.as_deref().unwrap_or("-")
        )
    });
    Ok(())
}

pub async fn project(market: &Marketplace, id: &str) -> Result<(), CliError> {
    let project = market.catalog().project(&ProjectId::new(id)).await?;
    println!("{}", project.title);
    if let Some(style) = &project.style {
        println!("Style : {style}");
    }
    if let Some(budget) = project.budget {
        println!("Budget : {budget}");
    }
    if !project.description.is_empty() {
        println!("\n{}", project.description);
    }
    Ok(())
}

pub async fn professionals(market: &Marketplace, query: &ListQuery) -> Result<(), CliError> {
    let listing = market.catalog().professionals(query).await?;
    print_listing(&listing, |p| {
        let rating = p
            .rating
            .map_or_else(|| "-".to_string(), |r| format!("{r:.1}/5 ({} avis)", p.review_count));
        format!("{:<12} {:<32} {:<30} {rating}", p.id.as_str(), p.company_name, p.specialties.join(", "))
    });
    Ok(())
}

pub async fn articles(market: &Marketplace, query: &ListQuery) -> Result<(), CliError> {
    let listing = market.catalog().articles(query).await?;
    print_listing(&listing, |a| format!("{:<12} {}", a.id.as_str(), a.title));
    Ok(())
}

pub async fn article(market: &Marketplace, id: &str) -> Result<(), CliError> {
    let article = market.catalog().article(&ArticleId::new(id)).await?;
    println!("{}", article.title);
    if let Some(author) = &article.author {
        println!("par {author}");
    }
    println!("\n{}", article.content.as_deref().unwrap_or(&article.excerpt));
    Ok(())
}

pub async fn forum(market: &Marketplace, query: &ListQuery) -> Result<(), CliError> {
    let listing = market.catalog().forum_topics(query).await?;
    print_listing(&listing, |t| {
        format!("{:<12} {:<60} {} réponses", t.id.as_str(), t.title, t.replies_count)
    });
    Ok(())
}

pub async fn ideabooks(market: &Marketplace) -> Result<(), CliError> {
    let ideabooks = market.catalog().ideabooks().await?;
    if ideabooks.is_empty() {
        println!("Aucun carnet d'idées");
    }
    for ideabook in ideabooks {
        let visibility = if ideabook.is_private { "privé" } else { "public" };
        println!("{} ({visibility}, {} éléments)", ideabook.name, ideabook.items.len());
    }
    Ok(())
}

pub async fn suggest(market: &Marketplace, text: &str) -> Result<(), CliError> {
    for suggestion in market.catalog().search_suggestions(text).await? {
        println!("{:?}: {}", suggestion.kind, suggestion.text);
    }
    Ok(())
}

fn print_listing<T>(listing: &Listing<T>, line: impl Fn(&T) -> String) {
    if listing.items.is_empty() {
        println!("Aucun résultat");
        return;
    }
    for item in &listing.items {
        println!("{}", line(item));
    }
    if let Some(pagination) = listing.pagination {
        println!(
            "-- page {}/{} ({} résultats)",
            pagination.page, pagination.pages, pagination.total
        );
    }
}
