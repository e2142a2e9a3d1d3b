//! Command handlers: thin presentation over the core clients.

use anyhow::Result;
use sana_core::auth::{LoginRequest, ProfileUpdate, RegisterRequest, User};
use sana_core::chat::{ChatClient, ChatMessage};
use sana_core::session::SessionController;

pub async fn register(
    controller: &SessionController,
    email: String,
    username: String,
    password: String,
) -> Result<()> {
    let user = controller
        .register(RegisterRequest {
            email,
            username,
            password,
        })
        .await?;
    println!("Registered and logged in as {} <{}>.", user.username, user.email);
    Ok(())
}

pub async fn login(controller: &SessionController, email: String, password: String) -> Result<()> {
    let user = controller.login(LoginRequest { email, password }).await?;
    println!("Logged in as {} <{}>.", user.username, user.email);
    Ok(())
}

pub async fn logout(controller: &SessionController) -> Result<()> {
    controller.logout().await;
    println!("Logged out.");
    Ok(())
}

pub fn whoami(controller: &SessionController) -> Result<()> {
    let state = controller.state();
    match state.user {
        Some(user) if state.authenticated => print_profile(&user),
        _ => println!("Not logged in."),
    }
    Ok(())
}

pub async fn update_profile(controller: &SessionController, update: ProfileUpdate) -> Result<()> {
    let user = controller.update_profile(update).await?;
    println!("Profile updated.");
    print_profile(&user);
    Ok(())
}

pub async fn refresh_profile(controller: &SessionController) -> Result<()> {
    let user = controller.refresh_profile().await?;
    println!("Session is still valid.");
    print_profile(&user);
    Ok(())
}

fn print_profile(user: &User) {
    println!("{} <{}>", user.username, user.email);
    println!(
        "  member since {}{}",
        user.created_at.format("%Y-%m-%d"),
        if user.is_verified { ", verified" } else { "" }
    );
    if let Some(full_name) = &user.full_name {
        println!("  name: {full_name}");
    }
    if let Some(age) = user.age {
        println!("  age: {age}");
    }
    if let Some(gender) = &user.gender {
        println!("  gender: {gender}");
    }
    if let Some(blood_type) = &user.blood_type {
        println!("  blood type: {blood_type}");
    }
}

pub async fn send_message(chat: &ChatClient, text: String, session: Option<i64>) -> Result<()> {
    let response = chat.send_message(text, session).await?;
    println!("[session {}]", response.session.id);
    print_message(&response.user_message);
    print_message(&response.ai_message);
    Ok(())
}

pub async fn list_sessions(chat: &ChatClient, skip: u32, limit: u32) -> Result<()> {
    let page = chat.sessions(skip, limit).await?;
    for session in &page.sessions {
        println!(
            "{:>6}  {}  {}{}",
            session.id,
            session.updated_at.format("%Y-%m-%d %H:%M"),
            session.title.as_deref().unwrap_or("(untitled)"),
            session
                .message_count
                .map(|count| format!("  [{count} messages]"))
                .unwrap_or_default()
        );
    }
    println!("{} of {} sessions", page.sessions.len(), page.total);
    Ok(())
}

pub async fn session_history(chat: &ChatClient, session_id: i64) -> Result<()> {
    let history = chat.session_history(session_id).await?;
    println!(
        "session {}: {}",
        history.session.id,
        history.session.title.as_deref().unwrap_or("(untitled)")
    );
    for message in &history.messages {
        print_message(message);
    }
    Ok(())
}

pub async fn create_session(chat: &ChatClient, title: Option<&str>) -> Result<()> {
    let session = chat.create_session(title).await?;
    println!(
        "Created session {} ({}).",
        session.id,
        session.title.as_deref().unwrap_or("untitled")
    );
    Ok(())
}

pub async fn delete_session(chat: &ChatClient, session_id: i64) -> Result<()> {
    let deleted = chat.delete_session(session_id).await?;
    println!("{}", deleted.message);
    Ok(())
}

fn print_message(message: &ChatMessage) {
    let speaker = if message.is_user_message { "you" } else { "sana" };
    println!("{speaker}: {}", message.content);
}
