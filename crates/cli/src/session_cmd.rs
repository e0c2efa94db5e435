use anyhow::{Result, bail};
use eduadmin_api::UserInfo;

use crate::context::AppContext;

pub async fn login(ctx: &AppContext, token: &str, name: Option<String>) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }

    let user_info = name.map(|name| UserInfo {
        name,
        ..UserInfo::default()
    });
    let offline = user_info.is_some();
    ctx.user.login(token, user_info);

    if !offline {
        // The client has already reported why the profile could not be read.
        if let Ok(profile) = ctx.client.current_user().await {
            ctx.user.set_user_info(profile);
        }
        // A 401 on the profile read clears the token again.
        if !ctx.user.is_logged_in() {
            bail!("The server rejected the token");
        }
    }
    println!("Signed in. {}", describe(ctx.user.user_info().as_ref()));
    Ok(())
}

pub fn logout(ctx: &AppContext) -> Result<()> {
    if !ctx.user.is_logged_in() {
        println!("Not signed in.");
        return Ok(());
    }
    ctx.user.logout();
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(ctx: &AppContext, refresh: bool) -> Result<()> {
    if !ctx.user.is_logged_in() {
        println!("Not signed in.");
        return Ok(());
    }
    if refresh {
        let profile = ctx.client.current_user().await?;
        ctx.user.set_user_info(profile);
    }
    println!("{}", describe(ctx.user.user_info().as_ref()));
    Ok(())
}

fn describe(user: Option<&UserInfo>) -> String {
    match user {
        Some(user) if !user.id.is_empty() => format!("User: {} ({})", display_name(user), user.id),
        Some(user) => format!("User: {}", display_name(user)),
        None => "User: (profile not loaded)".to_string(),
    }
}

fn display_name(user: &UserInfo) -> &str {
    if user.name.is_empty() { &user.phone } else { &user.name }
}
