//! Built-in demo catalog served when the backend is unreachable.

use async_trait::async_trait;

use renomarket_core::{
    ArticleId, ForumTopicId, IdeabookId, Money, ProductId, ProfessionalId, ProjectId,
};

use super::{CatalogError, CatalogSource};
use crate::api::Pagination;
use crate::models::{
    Article, ForumTopic, Ideabook, IdeabookItem, IdeabookItemKind, ListQuery, Listing, Product,
    Professional, Project, SearchSuggestion, SuggestionKind,
};

const DEFAULT_PAGE_SIZE: u32 = 12;
const MAX_SUGGESTIONS: usize = 8;

/// Static catalog.
#[derive(Debug, Clone, Default)]
pub struct FixtureCatalog {
    products: Vec<Product>,
    projects: Vec<Project>,
    professionals: Vec<Professional>,
    articles: Vec<Article>,
    forum_topics: Vec<ForumTopic>,
    ideabooks: Vec<Ideabook>,
}

impl FixtureCatalog {
    /// The demo data set shipped with the client.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            products: vec![
                product("demo-p1", "Parquet chêne massif", "sols", "Bois & Tradition", 4_990, Some(120)),
                product("demo-p2", "Mitigeur thermostatique", "salle-de-bain", "Aquaflux", 8_990, Some(35)),
                product("demo-p3", "Carrelage métro blanc", "cuisine", "Céramia", 2_450, Some(500)),
                product("demo-p4", "Peinture velours lin", "peinture", "Couleurs de France", 3_900, Some(0)),
                product("demo-p5", "Suspension rotin", "luminaires", "Atelier Lumen", 12_900, None),
            ],
            projects: vec![
                project("demo-r1", "Cuisine ouverte sur séjour", "cuisine", "contemporain", "Lyon", 1_850_000),
                project("demo-r2", "Salle de bain à l'italienne", "salle-de-bain", "minimaliste", "Nantes", 950_000),
                project("demo-r3", "Rénovation d'une longère", "maison", "campagne", "Rennes", 8_500_000),
            ],
            professionals: vec![
                professional("demo-pro1", "Atelier Bois & Tradition", &["menuiserie", "parquet"], "Rhône", 4.8, 57),
                professional("demo-pro2", "Martin Plomberie", &["plomberie", "salle de bain"], "Loire-Atlantique", 4.6, 31),
                professional("demo-pro3", "Studio Archi'Renov", &["architecture", "décoration"], "Paris", 4.9, 88),
            ],
            articles: vec![
                article("demo-a1", "Bien choisir son parquet", "sols", "Comparatif massif, contrecollé et stratifié."),
                article("demo-a2", "Budget d'une rénovation de salle de bain", "salle-de-bain", "Les postes de dépense à anticiper."),
                article("demo-a3", "Aides à la rénovation énergétique", "energie", "Panorama des dispositifs en vigueur."),
            ],
            forum_topics: vec![
                topic("demo-f1", "Isolation des combles perdus : laine soufflée ou rouleaux ?", "isolation", 14, 530),
                topic("demo-f2", "Retour d'expérience sur une douche à l'italienne", "salle-de-bain", 9, 312),
            ],
            ideabooks: vec![Ideabook {
                id: IdeabookId::new("demo-i1"),
                name: "Inspirations cuisine".to_string(),
                description: "Idées pour la future cuisine".to_string(),
                is_private: true,
                items: vec![
                    IdeabookItem {
                        item_type: IdeabookItemKind::Project,
                        item_id: "demo-r1".to_string(),
                        note: None,
                    },
                    IdeabookItem {
                        item_type: IdeabookItemKind::Product,
                        item_id: "demo-p3".to_string(),
                        note: Some("Pour la crédence".to_string()),
                    },
                ],
            }],
        }
    }

    /// An empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogSource for FixtureCatalog {
    async fn products(&self, query: &ListQuery) -> Result<Listing<Product>, CatalogError> {
        Ok(paginate(&self.products, query, |p| {
            query.matches(&format!("{} {}", p.name, p.description), p.category.as_deref())
        }))
    }

    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        find(&self.products, "product", id.as_str(), |p| &p.id == id)
    }

    async fn projects(&self, query: &ListQuery) -> Result<Listing<Project>, CatalogError> {
        Ok(paginate(&self.projects, query, |p| {
            query.matches(&format!("{} {}", p.title, p.description), p.category.as_deref())
        }))
    }

    async fn project(&self, id: &ProjectId) -> Result<Project, CatalogError> {
        find(&self.projects, "project", id.as_str(), |p| &p.id == id)
    }

    async fn professionals(&self, query: &ListQuery) -> Result<Listing<Professional>, CatalogError> {
        Ok(paginate(&self.professionals, query, |p| {
            // Professionals are categorized by specialty.
            let matches_category = query.category.as_deref().is_none_or(|wanted| {
                p.specialties.iter().any(|s| s.eq_ignore_ascii_case(wanted))
            });
            let text = format!("{} {}", p.company_name, p.specialties.join(" ")).to_lowercase();
            matches_category
                && query
                    .search
                    .as_deref()
                    .is_none_or(|needle| text.contains(&needle.trim().to_lowercase()))
        }))
    }

    async fn articles(&self, query: &ListQuery) -> Result<Listing<Article>, CatalogError> {
        Ok(paginate(&self.articles, query, |a| {
            query.matches(&format!("{} {}", a.title, a.excerpt), a.category.as_deref())
        }))
    }

    async fn article(&self, id: &ArticleId) -> Result<Article, CatalogError> {
        find(&self.articles, "article", id.as_str(), |a| &a.id == id)
    }

    async fn forum_topics(&self, query: &ListQuery) -> Result<Listing<ForumTopic>, CatalogError> {
        Ok(paginate(&self.forum_topics, query, |t| {
            query.matches(&t.title, t.category.as_deref())
        }))
    }

    async fn ideabooks(&self) -> Result<Vec<Ideabook>, CatalogError> {
        Ok(self.ideabooks.clone())
    }

    async fn search_suggestions(&self, text: &str) -> Result<Vec<SearchSuggestion>, CatalogError> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let products = self
            .products
            .iter()
            .map(|p| (p.name.as_str(), SuggestionKind::Product, p.id.as_str()));
        let projects = self
            .projects
            .iter()
            .map(|p| (p.title.as_str(), SuggestionKind::Project, p.id.as_str()));
        let professionals = self
            .professionals
            .iter()
            .map(|p| (p.company_name.as_str(), SuggestionKind::Professional, p.id.as_str()));
        let articles = self
            .articles
            .iter()
            .map(|a| (a.title.as_str(), SuggestionKind::Article, a.id.as_str()));

        Ok(products
            .chain(projects)
            .chain(professionals)
            .chain(articles)
            .filter(|(label, _, _)| label.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .map(|(label, kind, id)| SearchSuggestion {
                text: label.to_string(),
                kind,
                id: Some(id.to_string()),
            })
            .collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Filter then slice one page, with pagination metadata shaped like the
/// backend's.
fn paginate<T: Clone>(items: &[T], query: &ListQuery, keep: impl Fn(&T) -> bool) -> Listing<T> {
    let matching: Vec<&T> = items.iter().filter(|item| keep(item)).collect();

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let page = query.page.unwrap_or(1).max(1);
    let total = matching.len() as u64;
    let pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);
    let skip = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);

    Listing {
        items: matching
            .into_iter()
            .skip(skip)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect(),
        pagination: Some(Pagination {
            page,
            limit,
            total,
            pages,
        }),
    }
}

fn find<T: Clone>(
    items: &[T],
    kind: &'static str,
    id: &str,
    is_match: impl Fn(&T) -> bool,
) -> Result<T, CatalogError> {
    items
        .iter()
        .find(|item| is_match(item))
        .cloned()
        .ok_or_else(|| CatalogError::NotFound {
            kind,
            id: id.to_string(),
        })
}

fn product(id: &str, name: &str, category: &str, brand: &str, cents: i64, stock: Option<u32>) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: format!("{name} sélectionné par Renomarket."),
        price: Money::from_cents(cents),
        category: Some(category.to_string()),
        brand: Some(brand.to_string()),
        images: Vec::new(),
        stock,
        rating: None,
    }
}

fn project(id: &str, title: &str, category: &str, style: &str, location: &str, budget_cents: i64) -> Project {
    Project {
        id: ProjectId::new(id),
        title: title.to_string(),
        description: String::new(),
        category: Some(category.to_string()),
        style: Some(style.to_string()),
        location: Some(location.to_string()),
        budget: Some(Money::from_cents(budget_cents)),
        images: Vec::new(),
        professional: None,
    }
}

fn professional(
    id: &str,
    company_name: &str,
    specialties: &[&str],
    service_area: &str,
    rating: f32,
    review_count: u32,
) -> Professional {
    Professional {
        id: ProfessionalId::new(id),
        company_name: company_name.to_string(),
        specialties: specialties.iter().map(ToString::to_string).collect(),
        service_area: Some(service_area.to_string()),
        rating: Some(rating),
        review_count,
    }
}

fn article(id: &str, title: &str, category: &str, excerpt: &str) -> Article {
    Article {
        id: ArticleId::new(id),
        title: title.to_string(),
        excerpt: excerpt.to_string(),
        content: None,
        category: Some(category.to_string()),
        author: Some("La rédaction".to_string()),
        published_at: None,
    }
}

fn topic(id: &str, title: &str, category: &str, replies_count: u32, views: u32) -> ForumTopic {
    ForumTopic {
        id: ForumTopicId::new(id),
        title: title.to_string(),
        category: Some(category.to_string()),
        author: None,
        replies_count,
        views,
        created_at: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_filters_products() {
        let catalog = FixtureCatalog::demo();
        let listing = catalog.products(&ListQuery::search("parquet")).await.unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].id.as_str(), "demo-p1");
    }

    #[tokio::test]
    async fn test_pagination_metadata() {
        let catalog = FixtureCatalog::demo();
        let query = ListQuery {
            page: Some(2),
            limit: Some(2),
            ..ListQuery::default()
        };
        let listing = catalog.products(&query).await.unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].id.as_str(), "demo-p3");

        let pagination = listing.pagination.unwrap();
        assert_eq!(pagination.total, 5);
        assert_eq!(pagination.pages, 3);
        assert!(pagination.has_next());
    }

    #[tokio::test]
    async fn test_professionals_by_specialty() {
        let catalog = FixtureCatalog::demo();
        let query = ListQuery {
            category: Some("plomberie".to_string()),
            ..ListQuery::default()
        };
        let listing = catalog.professionals(&query).await.unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].company_name, "Martin Plomberie");
    }

    #[tokio::test]
    async fn test_suggestions_span_collections() {
        let catalog = FixtureCatalog::demo();
        let suggestions = catalog.search_suggestions("bain").await.unwrap();
        let kinds: Vec<_> = suggestions.iter().map(|s| s.kind).collect();
        assert!(kinds.contains(&SuggestionKind::Project));
        assert!(kinds.contains(&SuggestionKind::Article));
        assert!(catalog.search_suggestions("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_reports_not_found() {
        let err = FixtureCatalog::empty()
            .article(&ArticleId::new("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { kind: "article", .. }));
    }
}
