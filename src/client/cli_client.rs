use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use connecthub::client::auth::{auth_state, CurrentUser};
use connecthub::client::chat::sync::{is_disconnect, reconnect, sync_history};
use connecthub::client::chat::{connect_with_retry, ChannelEvent, ChatSession, EventReceiver, SendOutcome};
use connecthub::client::config::ClientConfig;
use connecthub::client::discovery::{
    ActionButton, DeckStatus, DiscoveryView, GestureRelease, Point, Resolution, SwipeResult,
};
use connecthub::client::services::message_parser::render_line;
use connecthub::client::services::{HttpApiClient, WebSocketConnector};
use connecthub::common::models::MatchId;
use connecthub::utils::logger;

#[derive(Parser, Debug)]
#[command(name = "connecthub-cli")]
#[command(about = "Terminal client for discovery and chat")]
struct Args {
    /// Local user id, as issued by the auth service.
    #[arg(short, long)]
    user_id: String,

    #[arg(short, long, default_value = "me")]
    name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Swipe through nearby candidates.
    Discover,
    /// Open the conversation for a match.
    Chat { match_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    logger::init(&config.log_level);
    let args = Args::parse();

    let (auth, reader) = auth_state();
    let mut user = CurrentUser::new(args.user_id.as_str(), args.name.as_str());
    if let Some(token) = &config.session_token {
        user = user.with_token(token.as_str());
    }
    auth.sign_in(user);

    let api = HttpApiClient::new(config.api_base_url.clone(), reader.clone());
    match args.command {
        Command::Discover => run_discover(api, &config).await,
        Command::Chat { match_id } => {
            let user = reader.current().context("not signed in")?;
            run_chat(api, &config, user, MatchId::from(match_id)).await
        }
    }
}

fn print_top(view: &DiscoveryView<HttpApiClient>) {
    match view.deck().top_candidate() {
        Some(c) => println!(
            "[CLIENT] {} ({}), {:.0} km{} | {} left",
            c.name,
            c.age,
            c.distance,
            if c.premium { " *" } else { "" },
            view.deck().len()
        ),
        None => match view.deck().status() {
            DeckStatus::NoEligible => println!("[CLIENT] Nobody matches your filters right now."),
            DeckStatus::Exhausted => println!("[CLIENT] No more people nearby. Type 'r' to reload."),
            _ => println!("[CLIENT] Loading..."),
        },
    }
}

fn print_result(view: &mut DiscoveryView<HttpApiClient>, result: SwipeResult) {
    match result {
        SwipeResult::Resolved(Resolution::Matched(_)) => {
            if let Some(celebration) = view.celebration() {
                println!("[CLIENT] It's a match with {}! 'd' keep swiping, 'm' send a message", celebration.candidate.name);
            }
        }
        SwipeResult::Resolved(Resolution::Failed { message, .. }) => {
            println!("[CLIENT] Could not record that: {}", message);
        }
        SwipeResult::Ignored => println!("[CLIENT] Nothing to do."),
        _ => {}
    }
    if let Some(notice) = view.take_notice() {
        println!("[CLIENT] {}", notice);
    }
}

async fn run_discover(api: HttpApiClient, config: &ClientConfig) -> anyhow::Result<()> {
    let mut view = DiscoveryView::new(api, config);
    if let Err(e) = view.load().await {
        println!("[CLIENT] Could not load candidates: {}", e);
    }
    println!("[CLIENT] l like, p pass, s super like, drag <dx> <dy>, t open card, r reload, matches, q quit");
    print_top(&view);

    let mut input = BufReader::new(stdin()).lines();
    while let Some(line) = input.next_line().await? {
        let mut parts = line.split_whitespace();
        let result = match parts.next().unwrap_or("") {
            "l" => Some(view.press(ActionButton::Like).await),
            "p" => Some(view.press(ActionButton::Pass).await),
            "s" => Some(view.press(ActionButton::SuperLike).await),
            "drag" => {
                let dx: f64 = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
                let dy: f64 = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
                if !view.pointer_down(Point::new(0.0, 0.0)) {
                    println!("[CLIENT] No card to drag.");
                    continue;
                }
                view.pointer_move(Point::new(dx, dy));
                match view.pointer_up() {
                    Some(GestureRelease::Swipe(outcome)) => Some(view.swipe(outcome).await),
                    Some(GestureRelease::Tap) | None => None,
                }
            }
            "t" => {
                view.pointer_down(Point::default());
                view.pointer_up();
                None
            }
            "d" => {
                view.dismiss_match();
                None
            }
            "m" => {
                if let Some(target) = view.send_message_to_match() {
                    match target.match_id {
                        Some(id) => println!("[CLIENT] Run `connecthub-cli chat {}` to talk to {}", id, target.candidate.name),
                        None => println!("[CLIENT] Match with {} saved, open it from 'matches'", target.candidate.name),
                    }
                }
                None
            }
            "r" => {
                if let Err(e) = view.load().await {
                    println!("[CLIENT] Could not load candidates: {}", e);
                }
                None
            }
            "matches" => {
                match view.matches().await {
                    Ok(matches) => {
                        for m in matches {
                            let last = m.last_message.map(|l| l.text).unwrap_or_default();
                            println!("[CLIENT] {} {} {}", m.id, m.user.name, last);
                        }
                    }
                    Err(e) => println!("[CLIENT] Could not load matches: {}", e),
                }
                continue;
            }
            "q" => break,
            "" => continue,
            other => {
                println!("[CLIENT] Unknown command '{}'", other);
                continue;
            }
        };
        if let Some(result) = result {
            print_result(&mut view, result);
        }
        if let Some(card) = view.selected() {
            println!("[CLIENT] {}: {} | {:?}", card.name, card.bio, card.interests);
            view.close_selected();
        }
        if view.celebration().is_none() {
            print_top(&view);
        }
    }

    view.close();
    Ok(())
}

async fn run_chat(
    api: HttpApiClient,
    config: &ClientConfig,
    user: Arc<CurrentUser>,
    match_id: MatchId,
) -> anyhow::Result<()> {
    let connector = WebSocketConnector::default();
    let channel = connect_with_retry(&connector, &config.chat_url, &config.reconnect)
        .await
        .context("could not reach the chat server")?;
    let (mut session, mut events) = ChatSession::open(match_id, user.clone(), channel, config.echo)?;

    sync_history(&mut session, &api, &mut events).await;
    for message in session.messages() {
        println!("{}", render_line(message, &user.display_name, "them"));
    }
    info!("[CLIENT] Chat ready, type /quit to leave");

    let mut input = BufReader::new(stdin()).lines();
    let mut printed = session.messages().len();
    let mut events = Some(events);
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "/quit" {
                    break;
                }
                session.set_composer(line);
                match session.send() {
                    Ok(SendOutcome::Sent { .. }) | Ok(SendOutcome::Ignored) => {}
                    Err(e) => println!("[CLIENT] Not sent ({}), text kept: {}", e, session.composer()),
                }
            }
            event = next_event(&mut events) => {
                let dropped = match event {
                    Some(event) => {
                        let dropped = is_disconnect(&event);
                        session.handle_event(event);
                        dropped
                    }
                    None => true,
                };
                if dropped {
                    if let Some(notice) = session.take_notice() {
                        println!("[CLIENT] {:?}", notice);
                    }
                    events = match reconnect(&mut session, &connector, &api, &config.chat_url, &config.reconnect).await {
                        Ok(fresh) => Some(fresh),
                        Err(e) => {
                            println!("[CLIENT] Offline ({}), /quit and reopen the chat to reconnect", e);
                            None
                        }
                    };
                }
            }
        }

        // Reconciled sends are replaced in place; only print what is new.
        let messages = session.messages();
        for message in messages.iter().skip(printed) {
            println!("{}", render_line(message, &user.display_name, "them"));
        }
        printed = messages.len();
    }

    session.close();
    Ok(())
}

async fn next_event(events: &mut Option<EventReceiver>) -> Option<ChannelEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
