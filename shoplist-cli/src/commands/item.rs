//! Shopping list item commands.

use clap::Args;
use futures::StreamExt;
use shoplist_core::{FilterType, Item, ItemId, ItemStore, SortOrder};

use super::{CommandError, OutputFormat};
use crate::sync::App;

const SHORT_ID_LEN: usize = 8;

#[derive(Args)]
pub struct ListCommand {
    /// Which items to show: all, bought, not_bought
    #[arg(long, default_value = "all")]
    pub filter: FilterType,

    /// Order by last update: date_desc, date_asc
    #[arg(long, default_value = "date_desc")]
    pub sort: SortOrder,

    /// Only items whose name or note contains this text
    #[arg(long, short)]
    pub search: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Keep running and print the list again after every change
    #[arg(long, short)]
    pub watch: bool,
}

impl ListCommand {
    pub async fn run(&self, app: &App) -> Result<(), CommandError> {
        let search = self.search.as_deref().unwrap_or("");
        let mut stream = app.list.get_list(self.filter, self.sort, search);

        if !self.watch {
            if let Some(items) = stream.next().await {
                self.print(&items?)?;
            }
            return Ok(());
        }

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(items) => {
                        self.print(&items?)?;
                        println!();
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        Ok(())
    }

    fn print(&self, items: &[Item]) -> Result<(), CommandError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
            OutputFormat::Table => print!("{}", render_table(items, self.filter, self.sort)),
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct ShowCommand {
    /// Item id (or a unique prefix of it)
    pub id: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub async fn run(&self, app: &App) -> Result<(), CommandError> {
        let id = resolve_id(app, &self.id).await?;
        let item = app
            .list
            .get_item(&id)
            .await?
            .ok_or_else(|| CommandError::UnknownItem(self.id.clone()))?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
            OutputFormat::Table => {
                println!("{}", item.name);
                println!("{}", "=".repeat(44));
                println!("ID:       {}", item.id);
                println!("Quantity: {}", item.quantity);
                println!("Bought:   {}", if item.is_bought { "yes" } else { "no" });
                if let Some(note) = &item.note {
                    println!("Note:     {}", note);
                }
                println!("Created:  {}", item.created_at.format("%Y-%m-%d %H:%M:%S"));
                println!("Updated:  {}", item.updated_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct AddCommand {
    /// Item name
    pub name: String,

    /// Quantity
    #[arg(long, short, default_value_t = 1, allow_negative_numbers = true)]
    pub qty: i32,

    /// Free-text note
    #[arg(long, short)]
    pub note: Option<String>,
}

impl AddCommand {
    pub async fn run(&self, app: &App) -> Result<(), CommandError> {
        let item = app
            .list
            .add_item(&self.name, self.qty, self.note.as_deref())
            .await?;

        println!("Added: {} x{} ({})", item.name, item.quantity, short_id(&item.id));
        report_offline(app);
        Ok(())
    }
}

#[derive(Args)]
pub struct EditCommand {
    /// Item id (or a unique prefix of it)
    pub id: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New quantity
    #[arg(long, short, allow_negative_numbers = true)]
    pub qty: Option<i32>,

    /// New note (an empty string clears it)
    #[arg(long, short)]
    pub note: Option<String>,
}

impl EditCommand {
    pub async fn run(&self, app: &App) -> Result<(), CommandError> {
        let id = resolve_id(app, &self.id).await?;
        let current = app
            .list
            .get_item(&id)
            .await?
            .ok_or_else(|| CommandError::UnknownItem(self.id.clone()))?;

        let name = self.name.as_deref().unwrap_or(&current.name);
        let quantity = self.qty.unwrap_or(current.quantity);
        let note = match &self.note {
            Some(note) => Some(note.as_str()),
            None => current.note.as_deref(),
        };

        let item = app.list.update_item(&id, name, quantity, note).await?;
        println!("Updated: {} x{} ({})", item.name, item.quantity, short_id(&item.id));
        report_offline(app);
        Ok(())
    }
}

/// An item addressed by id, used by delete, buy and unbuy.
#[derive(Args)]
pub struct ItemRef {
    /// Item id (or a unique prefix of it)
    pub id: String,
}

impl ItemRef {
    pub async fn delete(&self, app: &App) -> Result<(), CommandError> {
        let id = resolve_id(app, &self.id).await?;
        app.list.delete_item(&id).await?;
        println!("Deleted: {}", short_id(&id));
        report_offline(app);
        Ok(())
    }

    pub async fn set_bought(&self, app: &App, is_bought: bool) -> Result<(), CommandError> {
        let id = resolve_id(app, &self.id).await?;
        app.list.mark_bought(&id, is_bought).await?;

        let marker = if is_bought { "[x]" } else { "[ ]" };
        println!("{} {}", marker, short_id(&id));
        report_offline(app);
        Ok(())
    }
}

fn report_offline(app: &App) {
    if !app.engine().is_connected() {
        println!("Server unreachable, change saved locally and will sync later.");
    }
}

async fn resolve_id(app: &App, input: &str) -> Result<ItemId, CommandError> {
    let ids: Vec<ItemId> = app
        .store
        .read_all()
        .await?
        .into_iter()
        .map(|stored| stored.item.id)
        .collect();
    match_id(&ids, input)
}

/// Finds the id equal to `input`, or the only id starting with it.
fn match_id(ids: &[ItemId], input: &str) -> Result<ItemId, CommandError> {
    let input = input.trim();
    if let Some(id) = ids.iter().find(|id| id.as_str() == input) {
        return Ok(id.clone());
    }
    if input.is_empty() {
        return Err(CommandError::UnknownItem(input.to_string()));
    }

    let matches: Vec<&ItemId> = ids
        .iter()
        .filter(|id| id.as_str().starts_with(input))
        .collect();
    match matches.as_slice() {
        [id] => Ok((*id).clone()),
        [] => Err(CommandError::UnknownItem(input.to_string())),
        many => Err(CommandError::AmbiguousItem(input.to_string(), many.len())),
    }
}

fn short_id(id: &ItemId) -> &str {
    let s = id.as_str();
    s.get(..SHORT_ID_LEN).unwrap_or(s)
}

fn render_table(items: &[Item], filter: FilterType, sort: SortOrder) -> String {
    let mut out = String::new();
    out.push_str(&format!("Shopping List ({}, {})\n", filter, sort));
    out.push_str(&format!("{}\n", "=".repeat(44)));

    if items.is_empty() {
        out.push_str("No items.\n");
        return out;
    }

    for item in items {
        let check = if item.is_bought { "[x]" } else { "[ ]" };
        out.push_str(&format!(
            "{} {:<25} x{:<4} {}\n",
            check,
            item.name,
            item.quantity,
            short_id(&item.id)
        ));
        if let Some(note) = &item.note {
            out.push_str(&format!("    {}\n", note));
        }
    }

    let bought = items.iter().filter(|i| i.is_bought).count();
    out.push_str(&format!("{}\n", "-".repeat(44)));
    out.push_str(&format!("{} of {} items bought\n", bought, items.len()));
    out
}
