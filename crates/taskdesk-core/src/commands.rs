use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, anyhow};
use chrono::{Local, Utc};
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::cli::{Command, FilterArgs, TaskCommand, UserCommand};
use crate::config::Config;
use crate::filter::FilterInput;
use crate::forms::{FormFields, FormModal};
use crate::pages::dashboard::Dashboard;
use crate::pages::login::LoginPage;
use crate::pages::tasks::TasksPage;
use crate::pages::users::UsersPage;
use crate::pages::{Mount, Route, logout};
use crate::render::Renderer;
use crate::token_store::TokenStorage;

/// Everything a command needs, resolved once at startup.
pub struct AppContext<'a> {
    pub cfg: &'a Config,
    pub store: &'a dyn TokenStorage,
    pub api: &'a ApiClient,
    pub renderer: &'a Renderer,
}

#[instrument(skip(ctx, command))]
pub async fn dispatch(ctx: &AppContext<'_>, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");
    match command {
        Command::Login { username, password } => cmd_login(ctx, username, password).await,
        Command::Logout => {
            logout(ctx.store)?;
            println!("Signed out.");
            Ok(())
        }
        Command::Whoami { profile } => cmd_whoami(ctx, profile).await,
        Command::Tasks(action) => cmd_tasks(ctx, action).await,
        Command::Users(action) => cmd_users(ctx, action).await,
    }
}

async fn cmd_login(ctx: &AppContext<'_>, username: String, password: String) -> anyhow::Result<()> {
    info!("command login");
    let mut page = LoginPage::new(username, password);
    match page.submit(ctx.api, ctx.store).await {
        Some(_) => {
            println!("Signed in as {}.", page.form.username);
            Ok(())
        }
        None => Err(anyhow!("{}", page.error().unwrap_or("sign-in failed"))),
    }
}

async fn cmd_whoami(ctx: &AppContext<'_>, profile: bool) -> anyhow::Result<()> {
    info!("command whoami");
    let mut page = ready(Dashboard::mount(ctx.store, ctx.api, Utc::now())?)?;
    if profile {
        page.load_profile(ctx.cfg.page_size()).await?;
        check_redirect(page.redirect())?;
    }
    ctx.renderer.dashboard(io::stdout().lock(), &page)
}

#[instrument(skip(ctx, action))]
async fn cmd_tasks(ctx: &AppContext<'_>, action: TaskCommand) -> anyhow::Result<()> {
    let mut page = ready(TasksPage::mount(ctx.store, ctx.api, ctx.cfg.page_size(), Utc::now()).await?)?;

    match action {
        TaskCommand::List { filters, page: number } => {
            info!("command tasks list");
            if !filters.is_empty() || number > 0 {
                page.filter_page(filter_input(filters), number).await?;
            }
            check_page(page.redirect(), page.error())?;
            print_tasks(ctx, &page)
        }
        TaskCommand::Add {
            title,
            description,
            due,
            user_id,
        } => {
            info!("command tasks add");
            let modal = page.open_create();
            modal.set_field("title", &title)?;
            modal.set_field("description", &description)?;
            modal.set_field("dueDate", &due)?;
            if let Some(user_id) = user_id {
                modal.set_field("userId", &user_id.to_string())?;
            }
            let saved = page.submit_create().await?;
            check_redirect(page.redirect())?;
            match saved {
                Some(task) => {
                    println!("Created task {}.", task.id);
                    Ok(())
                }
                None => rejected(ctx, page.create_form(), "task was not created"),
            }
        }
        TaskCommand::Edit {
            id,
            page: number,
            title,
            description,
            due,
            completed,
        } => {
            info!("command tasks edit");
            go_to_tasks(&mut page, number).await?;
            let modal = page.open_edit(id)?;
            if let Some(title) = title {
                modal.set_field("title", &title)?;
            }
            if let Some(description) = description {
                modal.set_field("description", &description)?;
            }
            if let Some(due) = due {
                modal.set_field("dueDate", &due)?;
            }
            if let Some(completed) = completed {
                modal.set_field("completed", &completed.to_string())?;
            }
            let saved = page.submit_edit().await?;
            check_redirect(page.redirect())?;
            match saved {
                Some(task) => ctx.renderer.task_detail(io::stdout().lock(), &task),
                None => rejected(ctx, page.edit_form(), "task was not updated"),
            }
        }
        TaskCommand::Complete { id, page: number } => {
            info!("command tasks complete");
            go_to_tasks(&mut page, number).await?;
            let done = page.complete(id).await?;
            check_page(page.redirect(), page.error())?;
            if done.is_some() {
                println!("Completed task {id}.");
            }
            print_tasks(ctx, &page)
        }
        TaskCommand::Delete { id, page: number, yes } => {
            info!("command tasks delete");
            go_to_tasks(&mut page, number).await?;
            page.ask_delete(id);
            if !yes && !confirm(&format!("Delete task {id}?"))? {
                page.cancel_delete();
                println!("Nothing deleted.");
                return Ok(());
            }
            let deleted = page.confirm_delete().await?;
            check_page(page.redirect(), page.error())?;
            if deleted {
                println!("Deleted task {id}.");
            }
            print_tasks(ctx, &page)
        }
    }
}

#[instrument(skip(ctx, action))]
async fn cmd_users(ctx: &AppContext<'_>, action: UserCommand) -> anyhow::Result<()> {
    let mut page = ready(UsersPage::mount(ctx.store, ctx.api, ctx.cfg.page_size(), Utc::now()).await?)?;

    match action {
        UserCommand::List { page: number } => {
            info!("command users list");
            go_to_users(&mut page, number).await?;
            print_users(ctx, &page)
        }
        UserCommand::Add {
            name,
            mail,
            password,
            role,
        } => {
            info!("command users add");
            let modal = page.open_create();
            modal.set_field("name", &name)?;
            modal.set_field("mail", &mail)?;
            modal.set_field("password", &password)?;
            modal.set_field("role", &role)?;
            let saved = page.submit_create().await?;
            check_redirect(page.redirect())?;
            match saved {
                Some(user) => {
                    println!("Created user {}.", user.id);
                    Ok(())
                }
                None => rejected(ctx, page.create_form(), "user was not created"),
            }
        }
        UserCommand::Edit {
            id,
            page: number,
            name,
            mail,
            password,
            role,
        } => {
            info!("command users edit");
            go_to_users(&mut page, number).await?;
            let modal = page.open_edit(id)?;
            let changes = [("name", name), ("mail", mail), ("password", password), ("role", role)];
            for (field, value) in changes {
                if let Some(value) = value {
                    modal.set_field(field, &value)?;
                }
            }
            let saved = page.submit_edit().await?;
            check_redirect(page.redirect())?;
            match saved {
                Some(user) => ctx.renderer.user_detail(io::stdout().lock(), &user),
                None => rejected(ctx, page.edit_form(), "user was not updated"),
            }
        }
        UserCommand::Delete { id, page: number, yes } => {
            info!("command users delete");
            go_to_users(&mut page, number).await?;
            page.ask_delete(id);
            if !yes && !confirm(&format!("Delete user {id}?"))? {
                page.cancel_delete();
                println!("Nothing deleted.");
                return Ok(());
            }
            let deleted = page.confirm_delete().await?;
            check_page(page.redirect(), page.error())?;
            if deleted {
                println!("Deleted user {id}.");
            }
            print_users(ctx, &page)
        }
    }
}

fn filter_input(args: FilterArgs) -> FilterInput {
    FilterInput {
        title: args.title.unwrap_or_default(),
        completed: args.completed.unwrap_or_default(),
        due_before: args.due_before.unwrap_or_default(),
        user_id: args.user_id.unwrap_or_default(),
    }
}

async fn go_to_tasks(page: &mut TasksPage<'_>, number: u32) -> anyhow::Result<()> {
    if number > 0 {
        page.refresh(number).await?;
    }
    check_page(page.redirect(), page.error())
}

async fn go_to_users(page: &mut UsersPage<'_>, number: u32) -> anyhow::Result<()> {
    if number > 0 {
        page.reload(number).await?;
    }
    check_page(page.redirect(), page.error())
}

fn print_tasks(ctx: &AppContext<'_>, page: &TasksPage<'_>) -> anyhow::Result<()> {
    let list = page.list();
    let mut out = io::stdout().lock();
    ctx.renderer.task_stats(&mut out, list.stats())?;
    ctx.renderer.task_table(&mut out, list.items(), Local::now().date_naive())?;
    ctx.renderer.pager(
        &mut out,
        list.current_page(),
        list.total_pages(),
        list.can_previous(),
        list.can_next(),
    )
}

fn print_users(ctx: &AppContext<'_>, page: &UsersPage<'_>) -> anyhow::Result<()> {
    let list = page.list();
    let mut out = io::stdout().lock();
    ctx.renderer.user_table(&mut out, list.items())?;
    ctx.renderer.pager(
        &mut out,
        list.current_page(),
        list.total_pages(),
        list.can_previous(),
        list.can_next(),
    )
}

fn ready<P>(mount: Mount<P>) -> anyhow::Result<P> {
    match mount {
        Mount::Ready(page) => Ok(page),
        Mount::Redirect(route) => Err(redirect_error(route)),
    }
}

fn redirect_error(route: Route) -> anyhow::Error {
    match route {
        Route::Login => anyhow!("not signed in; run `taskdesk login` first"),
        other => anyhow!("redirected to {other}"),
    }
}

fn check_redirect(redirect: Option<Route>) -> anyhow::Result<()> {
    match redirect {
        Some(route) => Err(redirect_error(route)),
        None => Ok(()),
    }
}

fn check_page(redirect: Option<Route>, error: Option<&str>) -> anyhow::Result<()> {
    check_redirect(redirect)?;
    match error {
        Some(message) => Err(anyhow!("{message}")),
        None => Ok(()),
    }
}

fn rejected<F: FormFields>(ctx: &AppContext<'_>, modal: Option<&FormModal<F>>, what: &str) -> anyhow::Result<()> {
    if let Some(modal) = modal {
        ctx.renderer
            .form_errors(io::stderr().lock(), modal.banner(), modal.errors())?;
    }
    Err(anyhow!("{what}"))
}

/// Asks on stdin; anything but y/yes declines. Without a terminal the answer
/// is no.
fn confirm(question: &str) -> anyhow::Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        debug!("stdin is not a terminal; declining");
        return Ok(false);
    }
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("failed reading confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
