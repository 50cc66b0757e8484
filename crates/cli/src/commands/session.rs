//! Session commands.

use renomarket_client::Marketplace;
use renomarket_client::guard::RouteDecision;
use renomarket_client::models::{RegisterRequest, User};
use secrecy::SecretString;

use super::CliError;

/// Log in and print who we are.
pub async fn login(market: &Marketplace, email: &str, password: &SecretString) -> Result<(), CliError> {
    let user = market.auth().login(email, password).await?;
    println!("Connecté en tant que {}", describe(&user));
    Ok(())
}

/// Create an account.
pub async fn register(market: &Marketplace, request: RegisterRequest) -> Result<(), CliError> {
    let user = market.auth().register(&request).await?;
    println!("Compte créé : {}", describe(&user));
    Ok(())
}

pub fn logout(market: &Marketplace) {
    market.logout();
    println!("Déconnecté");
}

/// Print the restored session's user.
pub async fn whoami(market: &Marketplace) -> Result<(), CliError> {
    let user = require_session(market).await?;
    println!("{}", describe(&user));
    if let Some(phone) = &user.phone {
        println!("  téléphone : {phone}");
    }
    if let Some(info) = &user.professional_info {
        println!("  entreprise : {}", info.company_name);
        if !info.specialties.is_empty() {
            println!("  spécialités : {}", info.specialties.join(", "));
        }
    }
    Ok(())
}

/// Restore the stored session, failing if there is none.
pub async fn require_session(market: &Marketplace) -> Result<User, CliError> {
    market.start().await.ok_or(CliError::NotLoggedIn)
}

/// Print what a front end would do with `path` for the stored session.
pub async fn access(market: &Marketplace, path: &str) {
    if market.guard().is_protected(path) {
        market.start().await;
    }

    match market.guard().check(path, &market.auth().state()) {
        RouteDecision::Allow => println!("{path} : accès autorisé"),
        RouteDecision::Wait => println!("{path} : session en cours de chargement"),
        RouteDecision::RedirectToLogin { redirect } => println!("{path} : redirection vers {redirect}"),
    }
}

fn describe(user: &User) -> String {
    format!("{} <{}> ({})", user.display_name(), user.email, user.user_type)
}
