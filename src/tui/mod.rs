use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{
    ActivePane, App, AppMode, Command, CredentialField, LogsFocus, PendingAction, REGIONS, Slice,
};
use crate::models::{Health, format_millis, short_name};
use crate::refresh::REFRESH_PERIOD;
use crate::runtime::{Connector, Runtime};

pub async fn run<C: Connector>(rt: &mut Runtime<C>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    rt.start().await;

    let result = event_loop(&mut terminal, rt).await;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop<C: Connector>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    rt: &mut Runtime<C>,
) -> Result<()> {
    loop {
        rt.drain();
        terminal.draw(|frame| draw(frame, &rt.app))?;

        if event::poll(Duration::from_millis(200))? {
            match event::read()? {
                Event::Key(key) => {
                    if handle_key_event(key, rt).await? {
                        break;
                    }
                    rt.sync_auto_refresh();
                }
                Event::Resize(_, _) => continue,
                _ => continue,
            }
        }
    }
    Ok(())
}

async fn handle_key_event<C: Connector>(key: KeyEvent, rt: &mut Runtime<C>) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }

    if matches!(key.code, KeyCode::Char('c')) && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    let commands = match rt.app.mode {
        AppMode::Onboarding => {
            handle_onboarding_keys(key, rt).await?;
            return Ok(false);
        }
        AppMode::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?')) {
                rt.app.dismiss_overlay();
            }
            return Ok(false);
        }
        AppMode::ViewingLog => {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('l') | KeyCode::Char('L')
            ) {
                rt.app.dismiss_overlay();
            }
            return Ok(false);
        }
        AppMode::Confirming => handle_confirmation_keys(key, &mut rt.app),
        AppMode::ViewingTasks => handle_tasks_keys(key, &mut rt.app),
        AppMode::ViewingLogs => handle_logs_keys(key, &mut rt.app),
        AppMode::Browsing => match handle_dashboard_keys(key, &mut rt.app) {
            Some(commands) => commands,
            None => return Ok(true),
        },
    };
    rt.run(commands);
    Ok(false)
}

async fn handle_onboarding_keys<C: Connector>(key: KeyEvent, rt: &mut Runtime<C>) -> Result<()> {
    let draft = &mut rt.app.draft;
    match key.code {
        KeyCode::Esc => {
            if rt.app.is_configured() {
                rt.app.set_mode(AppMode::Browsing);
                rt.app.push_status("Credential edit cancelled");
            }
        }
        KeyCode::Tab | KeyCode::Down => draft.field = draft.field.next(),
        KeyCode::BackTab | KeyCode::Up => draft.field = draft.field.previous(),
        KeyCode::Left if draft.field == CredentialField::Region => draft.cycle_region(-1),
        KeyCode::Right if draft.field == CredentialField::Region => draft.cycle_region(1),
        KeyCode::Backspace => draft.backspace(),
        KeyCode::Char(ch) => draft.push(ch),
        KeyCode::Enter => {
            let credentials = draft.to_credentials();
            match rt.save_credentials(credentials).await {
                Ok(true) => {
                    rt.app.draft.secret_access_key.clear();
                }
                Ok(false) => {}
                Err(err) => rt
                    .app
                    .push_status(&format!("Failed to save credentials: {err:#}")),
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_confirmation_keys(key: KeyEvent, app: &mut App) -> Vec<Command> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('n') => {
            app.cancel();
            Vec::new()
        }
        KeyCode::Enter | KeyCode::Char('y') => app.confirm(),
        _ => Vec::new(),
    }
}

/// Returns `None` when the user asked to quit.
fn handle_dashboard_keys(key: KeyEvent, app: &mut App) -> Option<Vec<Command>> {
    let commands = match key.code {
        KeyCode::Char('q') => return None,
        KeyCode::Tab => {
            app.next_pane();
            Vec::new()
        }
        KeyCode::BackTab => {
            app.previous_pane();
            Vec::new()
        }
        KeyCode::Up => move_selection(app, -1),
        KeyCode::Down => move_selection(app, 1),
        KeyCode::PageUp => move_selection(app, -5),
        KeyCode::PageDown => move_selection(app, 5),
        KeyCode::Home => move_selection(app, isize::MIN / 2),
        KeyCode::End => move_selection(app, isize::MAX / 2),
        KeyCode::Enter => match app.active_pane {
            ActivePane::Clusters => app.select_cluster_at_cursor(),
            ActivePane::Services => app.view_tasks_at_cursor(),
            ActivePane::LoadBalancers => {
                match app.load_balancers.get(app.lb_cursor).map(|lb| lb.arn.clone()) {
                    Some(arn) => app.toggle_load_balancer(&arn),
                    None => Vec::new(),
                }
            }
        },
        KeyCode::Char('f') => {
            app.push_status("Refreshing…");
            app.refresh()
        }
        KeyCode::Char('a') => {
            app.toggle_auto_refresh();
            Vec::new()
        }
        KeyCode::Char('g') => {
            app.open_logs();
            Vec::new()
        }
        KeyCode::Char('c') => {
            app.set_mode(AppMode::Onboarding);
            app.push_status("Editing credentials – Enter to save, Esc to cancel");
            Vec::new()
        }
        KeyCode::Char('x') => {
            app.request_logout();
            Vec::new()
        }
        KeyCode::Char('?') => {
            app.overlay(AppMode::ShowingHelp);
            Vec::new()
        }
        KeyCode::Char('l') | KeyCode::Char('L') => {
            app.overlay(AppMode::ViewingLog);
            Vec::new()
        }
        _ => Vec::new(),
    };
    Some(commands)
}

fn handle_tasks_keys(key: KeyEvent, app: &mut App) -> Vec<Command> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.close_tasks();
            Vec::new()
        }
        KeyCode::Up => move_selection(app, -1),
        KeyCode::Down => move_selection(app, 1),
        KeyCode::Char('f') => app.reload_tasks(),
        KeyCode::Char('r') => {
            let selected = app
                .tasks
                .as_ref()
                .and_then(|view| view.selected())
                .map(|task| task.arn.clone());
            if let Some(arn) = selected
                && let Err(err) = app.request_restart(&arn)
            {
                app.push_status(&format!("Cannot restart: {err}"));
            }
            Vec::new()
        }
        KeyCode::Char('?') => {
            app.overlay(AppMode::ShowingHelp);
            Vec::new()
        }
        KeyCode::Char('l') | KeyCode::Char('L') => {
            app.overlay(AppMode::ViewingLog);
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn handle_logs_keys(key: KeyEvent, app: &mut App) -> Vec<Command> {
    if key.code == KeyCode::Esc {
        app.close_logs();
        return Vec::new();
    }
    if key.code == KeyCode::Tab {
        app.logs.focus = match app.logs.focus {
            LogsFocus::GroupInput => LogsFocus::Streams,
            LogsFocus::Streams => LogsFocus::GroupInput,
        };
        return Vec::new();
    }
    match app.logs.focus {
        LogsFocus::GroupInput => match key.code {
            KeyCode::Char(ch) => {
                app.logs.group_input.push(ch);
                Vec::new()
            }
            KeyCode::Backspace => {
                app.logs.group_input.pop();
                Vec::new()
            }
            KeyCode::Enter => {
                let group = app.logs.group_input.clone();
                match app.search_logs(&group) {
                    Ok(commands) => commands,
                    Err(err) => {
                        app.push_status(&err.to_string());
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        },
        LogsFocus::Streams => match key.code {
            KeyCode::Up => move_selection(app, -1),
            KeyCode::Down => move_selection(app, 1),
            KeyCode::Enter => app.select_stream_at_cursor(),
            KeyCode::PageUp => {
                app.logs.scroll = app.logs.scroll.saturating_sub(10);
                Vec::new()
            }
            KeyCode::PageDown => {
                let max = app.logs.events.len().saturating_sub(1);
                app.logs.scroll = (app.logs.scroll + 10).min(max);
                Vec::new()
            }
            _ => Vec::new(),
        },
    }
}

fn step(cursor: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    (cursor as isize).saturating_add(delta).clamp(0, len as isize - 1) as usize
}

fn move_selection(app: &mut App, delta: isize) -> Vec<Command> {
    match app.mode {
        AppMode::ViewingTasks => {
            if let Some(view) = app.tasks.as_mut() {
                view.cursor = step(view.cursor, view.tasks.len(), delta);
            }
        }
        AppMode::ViewingLogs => {
            app.logs.stream_cursor = step(app.logs.stream_cursor, app.logs.streams.len(), delta);
        }
        _ => match app.active_pane {
            ActivePane::Clusters => {
                app.cluster_cursor = step(app.cluster_cursor, app.clusters.len(), delta);
            }
            ActivePane::Services => {
                app.service_cursor = step(app.service_cursor, app.services.len(), delta);
            }
            ActivePane::LoadBalancers => {
                app.lb_cursor = step(app.lb_cursor, app.load_balancers.len(), delta);
            }
        },
    }
    Vec::new()
}

fn draw(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(4),
            Constraint::Length(3),
        ])
        .split(size);

    draw_header(frame, vertical[0], app);
    if app.mode == AppMode::Onboarding {
        draw_onboarding(frame, vertical[1], app);
    } else {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(vertical[1]);
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[0]);
        draw_clusters(frame, top[0], app);
        draw_services(frame, top[1], app);
        draw_load_balancers(frame, rows[1], app);
    }
    draw_status(frame, vertical[2], app);
    draw_command_bar(frame, vertical[3], app);

    match app.mode {
        AppMode::Confirming => draw_confirm_popup(frame, app),
        AppMode::ViewingTasks => draw_tasks_popup(frame, app),
        AppMode::ViewingLogs => draw_logs_popup(frame, app),
        AppMode::ShowingHelp => draw_help_popup(frame),
        AppMode::ViewingLog => draw_log_popup(frame, app),
        AppMode::Onboarding | AppMode::Browsing => {}
    }
}

fn draw_header(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let label = Style::default().fg(Color::Cyan);
    let value = Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD);
    let region = app.region.as_deref().unwrap_or("not configured");
    let refresh = if app.auto_refresh_active() {
        format!("on ({}s)", REFRESH_PERIOD.as_secs())
    } else {
        "off".into()
    };
    let mut spans = vec![
        Span::styled("Region: ", label),
        Span::styled(region, value),
        Span::raw("  │  "),
        Span::styled("Clusters: ", label),
        Span::styled(app.clusters.len().to_string(), value),
        Span::raw("  │  "),
        Span::styled("Running tasks: ", label),
        Span::styled(app.running_task_total().to_string(), value),
        Span::raw("  │  "),
        Span::styled("Auto-refresh: ", label),
        Span::styled(refresh, value),
    ];
    if app.is_busy() {
        spans.push(Span::styled(
            "  ⟳ loading",
            Style::default().fg(Color::Yellow),
        ));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            " ECS Lookout ",
            Style::default()
                .fg(Color::LightMagenta)
                .add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(Color::Black).fg(Color::White));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_onboarding(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let area = centered_rect(60, 70, area);
    let title_style = Style::default()
        .fg(Color::LightYellow)
        .add_modifier(Modifier::BOLD);
    let key_style = Style::default()
        .bg(Color::LightYellow)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD);
    let draft = &app.draft;

    let field = |name: &'static str, value: String, which: CredentialField| {
        let active = draft.field == which;
        let marker = if active { "► " } else { "  " };
        let value_style = if active {
            Style::default()
                .fg(Color::LightGreen)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::LightYellow)),
            Span::styled(format!("{name:<18}"), Style::default().fg(Color::Cyan)),
            Span::styled(value, value_style),
        ])
    };

    let secret = "*".repeat(draft.secret_access_key.chars().count());
    let lines = vec![
        Line::from("Enter an access key pair and pick a region."),
        Line::from(""),
        field(
            "Access key ID",
            format!("{}▏", draft.access_key_id),
            CredentialField::AccessKeyId,
        ),
        field(
            "Secret access key",
            format!("{secret}▏"),
            CredentialField::SecretAccessKey,
        ),
        field(
            "Region",
            format!("◀ {} ▶", draft.region()),
            CredentialField::Region,
        ),
        Line::from(""),
        Line::from(Span::styled(
            format!("{} regions available", REGIONS.len()),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Tab ", key_style),
            Span::raw(" next field  "),
            Span::styled(" ◀ ▶ ", key_style),
            Span::raw(" region  "),
            Span::styled(" Enter ", key_style),
            Span::raw(" save  "),
            Span::styled(" Ctrl+C ", key_style),
            Span::raw(" quit"),
        ]),
    ];
    let block = Block::default()
        .title(Span::styled(" AWS Credentials ", title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    draw_modal_surface(frame, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn pane_block(title: String, active: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(highlight_border(active))
        .style(Style::default().bg(Color::Black))
}

fn loading(app: &App, slice: Slice) -> &'static str {
    if app.is_loading(slice) { " ⟳" } else { "" }
}

fn render_list(
    frame: &mut ratatui::Frame,
    area: Rect,
    items: Vec<ListItem<'static>>,
    cursor: usize,
    block: Block<'static>,
) {
    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(cursor.min(items.len() - 1)));
    }
    let list = List::new(items)
        .highlight_style(Style::default().bg(Color::Blue))
        .block(block);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_clusters(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let title = format!("Clusters ({}){}", app.clusters.len(), loading(app, Slice::Clusters));
    let block = pane_block(title, app.active_pane == ActivePane::Clusters);
    let items = app
        .clusters
        .iter()
        .map(|cluster| {
            let chosen = app.selected_cluster.as_deref() == Some(cluster.arn.as_str());
            ListItem::new(Line::from(vec![
                Span::styled(
                    if chosen { "● " } else { "  " },
                    Style::default().fg(Color::LightYellow),
                ),
                Span::styled(format!("{:<24}", cluster.name), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:<10}", cluster.status),
                    health_style(Health::of_cluster(&cluster.status)),
                ),
                Span::raw(format!(
                    "run {} · pend {} · svc {}",
                    cluster.running_tasks_count,
                    cluster.pending_tasks_count,
                    cluster.active_services_count
                )),
            ]))
        })
        .collect();
    render_list(frame, area, items, app.cluster_cursor, block);
}

fn draw_services(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let title = match app.selected_cluster_name() {
        Some(name) => format!(
            "Services in {name} ({}){}",
            app.services.len(),
            loading(app, Slice::Services)
        ),
        None => "Services – select a cluster".to_string(),
    };
    let block = pane_block(title, app.active_pane == ActivePane::Services);
    let items = app
        .services
        .iter()
        .map(|service| {
            let counts_style = if service.is_settled() {
                Style::default().fg(Color::LightGreen)
            } else {
                Style::default().fg(Color::Yellow)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<28}", service.name), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:<10}", service.status),
                    health_style(Health::of_service(&service.status)),
                ),
                Span::styled(
                    format!(
                        "{}/{} running, {} pending",
                        service.running_count, service.desired_count, service.pending_count
                    ),
                    counts_style,
                ),
                Span::styled(
                    match service.load_balancers.len() {
                        0 => String::new(),
                        n => format!("  ⇄ {n} target group(s)"),
                    },
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();
    render_list(frame, area, items, app.service_cursor, block);
}

fn draw_load_balancers(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let title = format!(
        "Load balancers ({}){}",
        app.load_balancers.len(),
        loading(app, Slice::LoadBalancers)
    );
    let block = pane_block(title, app.active_pane == ActivePane::LoadBalancers);
    let mut items = Vec::new();
    let mut cursor = 0;
    for (idx, lb) in app.load_balancers.iter().enumerate() {
        if idx == app.lb_cursor {
            cursor = items.len();
        }
        let expanded = app.expanded_load_balancer.as_deref() == Some(lb.arn.as_str());
        items.push(ListItem::new(Line::from(vec![
            Span::raw(if expanded { "▾ " } else { "▸ " }),
            Span::styled(format!("{:<28}", lb.name), Style::default().fg(Color::White)),
            Span::styled(
                format!("{:<12}", lb.state),
                health_style(Health::of_load_balancer(&lb.state)),
            ),
            Span::raw(format!(
                "{:<12} {:<16} ",
                lb.kind.as_deref().unwrap_or("-"),
                lb.scheme.as_deref().unwrap_or("-")
            )),
            Span::styled(lb.dns_name.clone(), Style::default().fg(Color::DarkGray)),
        ])));
        if !expanded {
            continue;
        }
        if app.is_loading(Slice::TargetGroups) {
            items.push(ListItem::new(Line::from("    ⟳ loading target groups…")));
        }
        for entry in &app.target_groups {
            let healthy = entry
                .targets
                .iter()
                .filter(|t| Health::of_target(&t.state) == Health::Good)
                .count();
            items.push(ListItem::new(Line::from(vec![
                Span::raw("    "),
                Span::styled(
                    format!("{:<26}", entry.group.name),
                    Style::default().fg(Color::LightCyan),
                ),
                Span::raw(format!(
                    "{healthy}/{} healthy  check {}",
                    entry.targets.len(),
                    entry.group.health_check_path.as_deref().unwrap_or("-")
                )),
            ])));
            for target in &entry.targets {
                let port = target.target_port.map(|p| format!(":{p}")).unwrap_or_default();
                let reason = target.reason.as_deref().unwrap_or("");
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("      "),
                    Span::raw(format!("{:<24}", format!("{}{port}", target.target_id))),
                    Span::styled(
                        format!("{:<12}", target.state),
                        health_style(Health::of_target(&target.state)),
                    ),
                    Span::styled(reason.to_string(), Style::default().fg(Color::DarkGray)),
                ])));
            }
        }
    }
    render_list(frame, area, items, cursor, block);
}

fn draw_status(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = app
        .status
        .iter()
        .rev()
        .map(|msg| Line::from(msg.clone()))
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            "Status",
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(Color::Black));
    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(para, area);
}

fn draw_command_bar(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let key_style = Style::default()
        .bg(Color::LightCyan)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD);
    let keys: &[(&str, &str)] = match app.mode {
        AppMode::Onboarding => &[(" Tab ", " field "), (" Enter ", " save "), (" Esc ", " back")],
        AppMode::ViewingTasks => &[
            (" ↑↓ ", " select "),
            (" r ", "estart "),
            (" f ", "refresh "),
            (" Esc ", " close"),
        ],
        AppMode::ViewingLogs => &[
            (" Tab ", " focus "),
            (" Enter ", " search/open "),
            (" PgUp/PgDn ", " scroll "),
            (" Esc ", " close"),
        ],
        _ => &[
            (" Tab ", " pane "),
            (" Enter ", " open "),
            (" f ", "refresh "),
            (" a ", "uto-refresh "),
            (" g ", " logs "),
            (" c ", "redentials "),
            (" x ", " logout "),
            (" ? ", "help "),
            (" l ", "og "),
            (" q ", "uit"),
        ],
    };
    let spans: Vec<Span> = keys
        .iter()
        .flat_map(|(key, label)| [Span::styled(*key, key_style), Span::raw(*label)])
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Blue).fg(Color::White));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_tasks_popup(frame: &mut ratatui::Frame, app: &App) {
    let Some(view) = &app.tasks else {
        return;
    };
    let area = centered_rect(85, 70, frame.size());
    draw_modal_surface(frame, area);
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(6)])
        .split(area);

    let title = format!(
        " Tasks of {} in {} ({}){} ",
        view.service,
        short_name(&view.cluster),
        view.tasks.len(),
        loading(app, Slice::Tasks)
    );
    let block = pane_block(title, true);
    let items: Vec<ListItem> = view
        .tasks
        .iter()
        .map(|task| {
            let marker = if view.restarting.as_deref() == Some(task.arn.as_str()) {
                Span::styled("⟳ ", Style::default().fg(Color::Yellow))
            } else {
                Span::raw("  ")
            };
            ListItem::new(Line::from(vec![
                marker,
                Span::styled(format!("{:<34}", task.short_id()), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:<14}", task.last_status),
                    health_style(Health::of_task(&task.last_status)),
                ),
                Span::raw(format!("desired {:<10}", task.desired_status)),
                Span::styled(
                    format!(
                        "cpu {} mem {}",
                        task.cpu.as_deref().unwrap_or("-"),
                        task.memory.as_deref().unwrap_or("-")
                    ),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();
    render_list(frame, sections[0], items, view.cursor, block);

    let detail = match view.selected() {
        Some(task) => {
            let started = task
                .started_at
                .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".into());
            let containers = task
                .containers
                .iter()
                .map(|c| format!("{} ({})", c.name, c.last_status))
                .collect::<Vec<_>>()
                .join(", ");
            let hint = if app.can_restart(task) {
                Span::styled("r to restart", Style::default().fg(Color::LightGreen))
            } else {
                Span::styled(
                    "restart unavailable: task is not running",
                    Style::default().fg(Color::DarkGray),
                )
            };
            vec![
                Line::from(format!("Definition: {}", short_name(&task.task_definition_arn))),
                Line::from(format!("Started:    {started}")),
                Line::from(format!("Containers: {containers}")),
                Line::from(hint),
            ]
        }
        None => vec![Line::from("No tasks.")],
    };
    let block = Block::default()
        .title("Selected task")
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(
        Paragraph::new(detail).block(block).wrap(Wrap { trim: true }),
        sections[1],
    );
}

fn draw_logs_popup(frame: &mut ratatui::Frame, app: &App) {
    let logs = &app.logs;
    let area = centered_rect(90, 85, frame.size());
    draw_modal_surface(frame, area);
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(sections[1]);

    let input_focus = logs.focus == LogsFocus::GroupInput;
    let mut input = vec![
        Span::styled("Log group: ", Style::default().fg(Color::Cyan)),
        Span::styled(
            format!("{}{}", logs.group_input, if input_focus { "▏" } else { "" }),
            Style::default().fg(Color::White),
        ),
    ];
    if let Some(error) = &logs.error {
        input.push(Span::styled(
            format!("   {error}"),
            Style::default().fg(Color::Red),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(input)).block(pane_block(" Logs ".to_string(), input_focus)),
        sections[0],
    );

    let title = format!("Streams ({}){}", logs.streams.len(), loading(app, Slice::LogStreams));
    let items: Vec<ListItem> = logs
        .streams
        .iter()
        .map(|stream| {
            let open = logs.selected_stream.as_deref() == Some(stream.name.as_str());
            ListItem::new(vec![
                Line::from(Span::styled(
                    stream.short_name().to_string(),
                    if open {
                        Style::default()
                            .fg(Color::LightGreen)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::White)
                    },
                )),
                Line::from(Span::styled(
                    format_millis(stream.last_event_time),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();
    render_list(
        frame,
        body[0],
        items,
        logs.stream_cursor,
        pane_block(title, !input_focus),
    );

    let title = match &logs.selected_stream {
        Some(name) => format!(
            "{} ({} events){}",
            short_name(name),
            logs.events.len(),
            loading(app, Slice::LogEvents)
        ),
        None => "Events – pick a stream".to_string(),
    };
    let lines: Vec<Line> = logs
        .events
        .iter()
        .map(|event| {
            Line::from(vec![
                Span::styled(
                    format!("{} ", format_millis(event.timestamp)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(event.message.trim_end().to_string()),
            ])
        })
        .collect();
    let scroll = u16::try_from(logs.scroll).unwrap_or(u16::MAX);
    frame.render_widget(
        Paragraph::new(lines)
            .block(pane_block(title, false))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        body[1],
    );
}

fn draw_confirm_popup(frame: &mut ratatui::Frame, app: &App) {
    let area = centered_rect(60, 40, frame.size());
    draw_modal_surface(frame, area);

    let key_style = Style::default()
        .bg(Color::LightYellow)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD);
    let warn_style = Style::default()
        .fg(Color::LightYellow)
        .add_modifier(Modifier::BOLD);
    let highlight_style = Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD);

    let mut lines = Vec::new();

    if let Some(action) = &app.pending_action {
        match action {
            PendingAction::StopTask {
                cluster,
                service,
                task,
            } => {
                lines.push(Line::from(vec![Span::styled("Restart Task", warn_style)]));
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::raw("  Task:    "),
                    Span::styled(short_name(task).to_string(), highlight_style),
                ]));
                lines.push(Line::from(vec![
                    Span::raw("  Service: "),
                    Span::styled(service.clone(), highlight_style),
                ]));
                lines.push(Line::from(vec![
                    Span::raw("  Cluster: "),
                    Span::styled(short_name(cluster).to_string(), highlight_style),
                ]));
                lines.push(Line::from(""));
                lines.push(Line::from(
                    "The task is stopped and ECS starts a replacement automatically.",
                ));
            }
            PendingAction::Logout => {
                lines.push(Line::from(vec![Span::styled("Log Out", warn_style)]));
                lines.push(Line::from(""));
                lines.push(Line::from("Stored AWS credentials will be removed from this machine."));
            }
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Enter ", key_style),
        Span::raw(" Confirm   "),
        Span::styled(" Esc ", key_style),
        Span::raw(" Cancel"),
    ]));

    let block = Block::default()
        .title(Span::styled(
            " Confirm Action ",
            Style::default()
                .fg(Color::LightYellow)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(para, area);
}

fn draw_help_popup(frame: &mut ratatui::Frame) {
    let area = centered_rect(80, 80, frame.size());
    draw_modal_surface(frame, area);
    let title_style = Style::default()
        .fg(Color::LightYellow)
        .add_modifier(Modifier::BOLD);
    let block = Block::default()
        .title(Span::styled("Help – Press ? or Esc to close", title_style))
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Black));

    let key_style = Style::default()
        .fg(Color::LightCyan)
        .add_modifier(Modifier::BOLD);
    let header_style = Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD);

    let lines = vec![
        Line::from(vec![Span::styled("DASHBOARD", header_style)]),
        Line::from(vec![
            Span::styled("Tab/Shift+Tab", key_style),
            Span::raw(" - Switch between Clusters, Services and Load balancers  "),
            Span::styled("↑↓", key_style),
            Span::raw(" - Move selection"),
        ]),
        Line::from(vec![
            Span::styled("Enter", key_style),
            Span::raw(" - Select a cluster, open a service's tasks or expand a load balancer"),
        ]),
        Line::from(vec![
            Span::styled("f", key_style),
            Span::raw(" - Refresh now  "),
            Span::styled("a", key_style),
            Span::raw(format!(
                " - Toggle auto-refresh every {}s",
                REFRESH_PERIOD.as_secs()
            )),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled("TASKS", header_style)]),
        Line::from(vec![
            Span::styled("r", key_style),
            Span::raw(" - Restart the selected task (running tasks only, asks first)"),
        ]),
        Line::from("   • The task is stopped; ECS schedules its replacement"),
        Line::from(""),
        Line::from(vec![Span::styled("LOGS", header_style)]),
        Line::from(vec![
            Span::styled("g", key_style),
            Span::raw(" - Open the log viewer, type a log group and press Enter"),
        ]),
        Line::from("   • The 10 most recently active streams are listed"),
        Line::from("   • Opening a stream shows its latest 200 events"),
        Line::from(""),
        Line::from(vec![Span::styled("ACCOUNT", header_style)]),
        Line::from(vec![
            Span::styled("c", key_style),
            Span::raw(" - Edit credentials  "),
            Span::styled("x", key_style),
            Span::raw(" - Log out and remove stored credentials"),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled("OTHER COMMANDS", header_style)]),
        Line::from(vec![
            Span::styled("l", key_style),
            Span::raw(" - Toggle status log  "),
            Span::styled("?", key_style),
            Span::raw(" - Toggle this help  "),
            Span::styled("q", key_style),
            Span::raw(" or "),
            Span::styled("Ctrl+C", key_style),
            Span::raw(" - Quit"),
        ]),
    ];
    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(para, area);
}

fn draw_log_popup(frame: &mut ratatui::Frame, app: &App) {
    let area = centered_rect(70, 60, frame.size());
    draw_modal_surface(frame, area);
    let block = Block::default()
        .title("Status log – Esc/l/Enter to close")
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Black));
    let mut lines: Vec<Line> = app
        .status
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, msg)| Line::from(format!("{:>2}. {}", idx + 1, msg)))
        .collect();
    if lines.is_empty() {
        lines.push(Line::from("No status messages yet."));
    }
    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(para, area);
}

fn draw_modal_surface(frame: &mut ratatui::Frame, area: Rect) {
    frame.render_widget(Clear, area);
    let backdrop = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(backdrop, area);

    let canvas = frame.size();
    let shadow_style = Style::default().bg(Color::DarkGray);
    if area.y + area.height < canvas.height {
        let shadow_width = area.width.min(canvas.width.saturating_sub(area.x + 1));
        if shadow_width > 0 {
            let shadow = Rect::new(area.x + 1, area.y + area.height, shadow_width, 1);
            frame.render_widget(Block::default().style(shadow_style), shadow);
        }
    }
    if area.x + area.width < canvas.width {
        let shadow_height = area.height.min(canvas.height.saturating_sub(area.y + 1));
        if shadow_height > 0 {
            let shadow = Rect::new(area.x + area.width, area.y + 1, 1, shadow_height);
            frame.render_widget(Block::default().style(shadow_style), shadow);
        }
    }
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100 - height_percent) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn highlight_border(active: bool) -> Style {
    if active {
        Style::default()
            .fg(Color::LightYellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn health_style(health: Health) -> Style {
    match health {
        Health::Good => Style::default()
            .fg(Color::LightGreen)
            .add_modifier(Modifier::BOLD),
        Health::Warming => Style::default().fg(Color::Yellow),
        Health::Bad => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Health::Unknown => Style::default().fg(Color::DarkGray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn step_clamps_to_the_list() {
        assert_eq!(step(0, 0, 1), 0);
        assert_eq!(step(0, 3, -1), 0);
        assert_eq!(step(1, 3, 5), 2);
        assert_eq!(step(2, 3, isize::MIN / 2), 0);
    }

    #[test]
    fn enter_on_clusters_selects_and_loads_services() {
        let mut app = App::new();
        app.on_configured("us-east-1");
        app.clusters = vec![fake::cluster("arn:cluster/a", 1), fake::cluster("arn:cluster/b", 2)];
        handle_dashboard_keys(key(KeyCode::Down), &mut app);
        let commands = handle_dashboard_keys(key(KeyCode::Enter), &mut app).unwrap();
        assert_eq!(app.selected_cluster.as_deref(), Some("arn:cluster/b"));
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn q_quits_from_the_dashboard() {
        let mut app = App::new();
        app.on_configured("us-east-1");
        assert!(handle_dashboard_keys(key(KeyCode::Char('q')), &mut app).is_none());
    }

    #[test]
    fn empty_group_search_reports_and_issues_nothing() {
        let mut app = App::new();
        app.on_configured("us-east-1");
        app.open_logs();
        let commands = handle_logs_keys(key(KeyCode::Enter), &mut app);
        assert!(commands.is_empty());
        assert_eq!(
            app.status.back().map(String::as_str),
            Some("Please enter a log group name")
        );
    }

    #[test]
    fn restart_key_on_a_stopped_task_does_not_prompt() {
        let mut app = App::new();
        app.on_configured("us-east-1");
        app.select_cluster("arn:cluster/a");
        app.view_tasks("web");
        if let Some(view) = app.tasks.as_mut() {
            view.tasks = vec![fake::task("arn:task/a/1", "STOPPED")];
        }
        handle_tasks_keys(key(KeyCode::Char('r')), &mut app);
        assert_eq!(app.mode, AppMode::ViewingTasks);
        assert!(app.pending_action.is_none());
    }
}
