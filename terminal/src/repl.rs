//! Interactive loop: stdin commands in, view state out

use pollchat_core::{
    ChatClient, ContactDirectoryView, ConversationView, Direction, ListStatus, MessageRow,
    StoreEvent, UserId,
};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
/contacts        list contacts
/search <query>  search the user directory
/add <id>        add a user as a contact
/open <id>       open the conversation with a contact
/quit            log out and exit
anything else is sent to the open conversation";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Contacts,
    Search(String),
    Add(UserId),
    Open(UserId),
    Help,
    Quit,
    Say(String),
}

/// Parses one input line. `Err` carries a usage hint.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if !line.starts_with('/') {
        return Ok(Command::Say(line.to_string()));
    }

    let (cmd, arg) = match line.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };
    let id = |arg: &str| {
        arg.parse::<UserId>()
            .map_err(|_| format!("{} needs a numeric user id", cmd))
    };

    match cmd {
        "/contacts" => Ok(Command::Contacts),
        "/search" => Ok(Command::Search(arg.to_string())),
        "/add" => id(arg).map(Command::Add),
        "/open" => id(arg).map(Command::Open),
        "/help" => Ok(Command::Help),
        "/quit" => Ok(Command::Quit),
        other => Err(format!("Unknown command {}; try /help", other)),
    }
}

pub fn format_row(row: &MessageRow) -> String {
    let arrow = match row.direction {
        Direction::Incoming => "<",
        Direction::Outgoing => ">",
    };
    let marker = if row.pending { " *" } else { "" };
    format!("[{:>5}] {} {}{}", row.timestamp, arrow, row.text, marker)
}

fn print_contacts(view: &ContactDirectoryView) {
    match view.status() {
        ListStatus::Loading => println!("Loading..."),
        ListStatus::Empty => println!("No contacts found"),
        ListStatus::Loaded => {
            let selected = view.selected();
            for row in view.contacts() {
                let mark = if Some(row.user_id) == selected { "*" } else { " " };
                println!("{}[{}] {} <{}> {}", mark, row.user_id, row.name, row.email, row.descr);
            }
        }
    }
}

type RowKey = (String, String, Direction);

/// Rows already printed for the open conversation, counted by content.
///
/// Fetches replace the whole list, so position and length say nothing about
/// what is new: an optimistic row can vanish and come back as its echo, or be
/// swapped for an incoming message without the list growing.
#[derive(Default)]
struct Transcript {
    conversation: Option<UserId>,
    printed: HashMap<RowKey, usize>,
}

impl Transcript {
    /// Rows of `rows` not yet printed for `conversation`, marking them printed.
    fn fresh_rows(&mut self, conversation: Option<UserId>, rows: &[MessageRow]) -> Vec<MessageRow> {
        if conversation != self.conversation {
            self.conversation = conversation;
            self.printed.clear();
        }

        let mut occurrences: HashMap<RowKey, usize> = HashMap::new();
        let mut fresh = Vec::new();
        for row in rows {
            let key = (row.text.clone(), row.timestamp.clone(), row.direction);
            let nth = occurrences.entry(key.clone()).or_default();
            *nth += 1;
            let printed = self.printed.entry(key).or_default();
            if *nth > *printed {
                *printed = *nth;
                fresh.push(row.clone());
            }
        }
        fresh
    }
}

pub async fn run(client: &ChatClient) -> anyhow::Result<()> {
    client.start_directory_sync()?;

    let mut conversation = client.conversation_view();
    let contacts = client.contacts_view();
    let mut changes = conversation.changes();
    let mut transcript = Transcript::default();

    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let _notice_sub = client.store().subscribe(move |event| {
        if let StoreEvent::Notice(Some(notice)) = event {
            let _ = notice_tx.send(notice.clone());
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(client, &mut conversation, &contacts, command).await,
                    Err(hint) => println!("{}", hint),
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let selected = client.store().selected_contact();
                for row in transcript.fresh_rows(selected, &conversation.rows()) {
                    println!("{}", format_row(&row));
                }
            }
            Some(notice) = notices.recv() => {
                println!("! {}", notice);
                client.store().take_notice();
            }
        }
    }

    client.logout();
    Ok(())
}

async fn execute(
    client: &ChatClient,
    conversation: &mut ConversationView,
    contacts: &ContactDirectoryView,
    command: Command,
) {
    match command {
        Command::Contacts => print_contacts(contacts),
        Command::Search(query) => {
            contacts.open_overlay();
            contacts.set_query(&query);
            let results = contacts.results();
            if results.is_empty() {
                println!("No matching users");
            }
            for user in results {
                println!(" [{}] {} <{}>", user.user_id, user.display_name(), user.email);
            }
        }
        Command::Add(id) => {
            if contacts.add(client.directory(), id).await.is_ok() {
                contacts.close_overlay();
                println!("Added {}", id);
            }
        }
        Command::Open(id) => {
            if let Err(e) = contacts.pick(client.messaging(), id) {
                println!("! {}", e.notice());
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Say(text) => {
            conversation.set_input(text);
            if let Err(e) = conversation.submit(client.messaging()) {
                println!("! {}", e.notice());
            }
        }
        Command::Quit => {}
    }
}
