use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};

use crate::cli::state::{App, EditField, Tab};
use crate::cli::util::{bar, fmt_money, fmt_signed, fmt_when};
use crate::database::models::{ChatRole, TransactionKind};
use crate::engine::Badge;
use crate::service::today;

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.size();

    // top tabs | main content | bottom status bar
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(1)])
        .split(size);

    let titles = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(Span::raw(format!("{} {}", i + 1, t.title()))))
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .block(Block::default().borders(Borders::ALL).title("Shadoron"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(tabs, root[0]);

    match app.tab {
        Tab::Envelopes => draw_envelopes(f, root[1], app),
        Tab::History => draw_history(f, root[1], app),
        Tab::Add => draw_add(f, root[1], app),
        Tab::Progress => draw_progress(f, root[1], app),
        Tab::Oracle => draw_oracle(f, root[1], app),
        Tab::Help => draw_help(f, root[1]),
    }

    let sync = match app.pending {
        Some(n) => format!("  [{n} to sync]"),
        None => String::new(),
    };
    f.render_widget(Paragraph::new(format!("{}{}", app.status, sync)), root[2]);
}

// Envelopes Page

fn draw_envelopes(f: &mut Frame, area: Rect, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let items: Vec<ListItem> = app
        .envelopes
        .iter()
        .map(|e| {
            let weight = e.percent.map(|p| format!("{p:>5}%")).unwrap_or_else(|| "   --".into());
            let style = if e.balance.is_sign_negative() {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{} {:<14}", e.icon, e.name)),
                Span::raw(weight),
                Span::raw(if e.locked { " 🔒 " } else { "    " }),
                Span::styled(format!("{:>12}", fmt_money(&e.balance)), style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Envelopes  (Up/Down, +/- weight, r=refresh)"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, cols[0], &mut app.env_sel);

    let total = app
        .envelopes
        .iter()
        .fold(rust_decimal::Decimal::ZERO, |acc, e| acc.saturating_add(e.balance));
    let details = match app.selected_envelope() {
        Some(e) => format!(
            "Key: {}\nName: {}\nBloc: {}\nWeight: {}\nLocked: {}\nBalance: {}\n\nAll envelopes: {}",
            e.key,
            e.name,
            e.bloc,
            e.percent.map(|p| format!("{p}%")).unwrap_or_else(|| "surplus bucket".into()),
            if e.locked { "yes" } else { "no" },
            fmt_money(&e.balance),
            fmt_money(&total),
        ),
        None => "No envelope selected".into(),
    };
    let right = Paragraph::new(details).block(Block::default().borders(Borders::ALL).title("Details"));
    f.render_widget(right, cols[1]);
}

// History Page

fn draw_history(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(vec!["When", "Type", "Envelope", "Note", "Amount"]).height(1);

    let body: Vec<Row> = app
        .history
        .iter()
        .map(|t| {
            let signed = match t.kind {
                TransactionKind::Income => t.amount,
                TransactionKind::Expense => -t.amount,
            };
            Row::new(vec![
                Cell::from(fmt_when(&t.timestamp)),
                Cell::from(t.kind.as_str()),
                Cell::from(t.category.clone().unwrap_or_else(|| "(split)".into())),
                Cell::from(t.note.clone().unwrap_or_default()),
                Cell::from(fmt_signed(&signed)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(17),
        Constraint::Length(8),
        Constraint::Length(12),
        Constraint::Percentage(50),
        Constraint::Length(12),
    ];

    let table = Table::new(body, widths)
        .header(header.style(Style::default().add_modifier(Modifier::BOLD)))
        .block(Block::default().borders(Borders::ALL).title("History  (x/Del delete)"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(table, area, &mut app.hist_sel);
}

// Add Page

fn draw_add(f: &mut Frame, area: Rect, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(7), Constraint::Length(8)])
        .split(cols[0]);

    let form = &app.add;
    let kind = match form.kind {
        Some(TransactionKind::Income) => "Income (+), split across envelopes",
        Some(TransactionKind::Expense) => "Expense (-)",
        None => "<press i or e>",
    };
    let envelope = if form.is_expense() {
        app.selected_category()
            .map(|c| format!("{} {}", c.icon, c.name))
            .unwrap_or_else(|| "<none>".into())
    } else {
        "-".into()
    };

    let form_lines = [
        format!("Type    : {kind}"),
        format!("Amount  : {}", form.amount.rendered(form.editing == Some(EditField::Amount))),
        format!("Note    : {}", form.note.rendered(form.editing == Some(EditField::Note))),
        format!("Envelope: {envelope}"),
    ]
    .join("\n");
    f.render_widget(
        Paragraph::new(form_lines).block(Block::default().borders(Borders::ALL).title("New transaction")),
        left[0],
    );

    let status = if let Some(err) = &form.error {
        Line::styled(format!("Error: {err}"), Style::default().fg(Color::Red))
    } else if let Some(ok) = &form.success {
        Line::styled(ok.clone(), Style::default().fg(Color::Green))
    } else {
        Line::raw("")
    };
    let help = vec![
        Line::raw("a/n: edit amount/note | Tab: switch field"),
        Line::raw("t: toggle type | Up/Down: envelope"),
        Line::raw("Enter: save | Esc: stop editing / back"),
        Line::raw(""),
        status,
    ];
    f.render_widget(
        Paragraph::new(help)
            .block(Block::default().borders(Borders::ALL).title("Help & Status"))
            .wrap(Wrap { trim: true }),
        left[1],
    );

    let items: Vec<ListItem> = app
        .categories
        .iter()
        .map(|c| ListItem::new(format!("{} {}  ({}%)", c.icon, c.name, c.percent)))
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Expense envelope"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, cols[1], &mut app.add.cat_sel);
}

// Progress Page

fn draw_progress(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(progress) = &app.progress else {
        f.render_widget(Paragraph::new("Loading…").block(Block::default().borders(Borders::ALL)), area);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6)])
        .split(area);

    let label = match (progress.rank.next, progress.rank.xp_to_next) {
        (Some(next), Some(left)) => format!("{} · {} XP · {left} to {}", progress.rank.rank.name, progress.state.xp, next.name),
        _ => format!("{} · {} XP · top rank", progress.rank.rank.name, progress.state.xp),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Rank"))
        .gauge_style(Style::default().fg(Color::Yellow))
        .percent(u16::from(progress.rank.percent))
        .label(label);
    f.render_widget(gauge, rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    let streak = &progress.state.streak;
    let mut left = vec![
        Line::raw(format!("Streak: {} day(s), best {}", streak.current, streak.best)),
        Line::raw(""),
        Line::styled("Badges", Style::default().add_modifier(Modifier::BOLD)),
    ];
    for badge in Badge::ALL {
        let mark = if progress.state.has_badge(badge) { "[x]" } else { "[ ]" };
        left.push(Line::raw(format!("{mark} {}", badge.title())));
    }
    f.render_widget(
        Paragraph::new(left).block(Block::default().borders(Borders::ALL).title("Streak & badges")),
        cols[0],
    );

    let today = today();
    let mut right = vec![Line::styled("Savings goals", Style::default().add_modifier(Modifier::BOLD))];
    if progress.goals.is_empty() {
        right.push(Line::raw("  none yet"));
    }
    for g in &progress.goals {
        let pace = g
            .monthly_required(today)
            .map(|m| format!(", {}/month", fmt_money(&m)))
            .unwrap_or_default();
        right.push(Line::raw(format!(
            "  {} {} {}/{}{pace}",
            g.name,
            bar(g.progress_percent(), 10),
            fmt_money(&g.current),
            fmt_money(&g.target),
        )));
    }
    right.push(Line::raw(""));
    right.push(Line::styled("Debts", Style::default().add_modifier(Modifier::BOLD)));
    if progress.debts.is_empty() {
        right.push(Line::raw("  none"));
    }
    for d in &progress.debts {
        let payoff = match d.payoff_months(d.minimum_payment) {
            Some(0) => "paid off".to_string(),
            Some(m) => format!("{m} months at minimum"),
            None => "minimum does not cover interest".to_string(),
        };
        right.push(Line::raw(format!("  {} {} left, {payoff}", d.name, fmt_money(&d.remaining))));
    }
    f.render_widget(
        Paragraph::new(right)
            .block(Block::default().borders(Borders::ALL).title("Goals & debts"))
            .wrap(Wrap { trim: false }),
        cols[1],
    );
}

// Oracle Page

fn draw_oracle(f: &mut Frame, area: Rect, app: &mut App) {
    if !app.api.has_oracle() {
        let p = Paragraph::new("The Oracle is offline.\n\nSet ORACLE_ENDPOINT and ORACLE_API_KEY to enable it.")
            .block(Block::default().borders(Borders::ALL).title("Oracle"));
        f.render_widget(p, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(area);

    let page = &app.oracle;
    let mut lines = Vec::new();
    for m in &page.messages {
        let (who, color) = match m.role {
            ChatRole::User => ("you", Color::Cyan),
            ChatRole::Assistant => ("oracle", Color::Magenta),
            ChatRole::System => ("system", Color::DarkGray),
        };
        lines.push(Line::styled(format!("{who}:"), Style::default().fg(color).add_modifier(Modifier::BOLD)));
        lines.extend(m.content.lines().map(|l| Line::raw(l.to_string())));
        lines.push(Line::raw(""));
    }
    if let Some(q) = &page.asking {
        lines.push(Line::styled("you:", Style::default().fg(Color::Cyan)));
        lines.push(Line::raw(q.clone()));
        lines.push(Line::styled("oracle is thinking…", Style::default().fg(Color::DarkGray)));
    }
    if let Some(err) = &page.error {
        lines.push(Line::styled(format!("Error: {err}"), Style::default().fg(Color::Red)));
    }

    // keep the newest lines in view
    let visible = rows[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;
    let title = page.session.as_ref().map(|s| s.title.as_str()).unwrap_or("Oracle");
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        rows[0],
    );

    let prompt = if page.editing {
        page.input.rendered(true)
    } else {
        "Press Enter to ask".to_string()
    };
    f.render_widget(
        Paragraph::new(prompt).block(Block::default().borders(Borders::ALL).title("Question (Enter send, Esc stop)")),
        rows[1],
    );
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help_text = [
        "Global Keys:",
        "  q          : Quit",
        "  1-6 / Tab  : Switch tabs",
        "  i / e      : New income / expense",
        "  s          : Sync the offline queue with REMOTE_URL",
        "  r          : Refresh data",
        "  ?          : This help",
        "",
        "Envelopes Tab:",
        "  Up/Down    : Navigate",
        "  + / -      : Raise / lower the weight by one point (others rebalance)",
        "",
        "History Tab:",
        "  Up/Down    : Navigate",
        "  x/Del      : Delete the transaction and reverse its allocations",
        "",
        "Add Tab:",
        "  a / n      : Edit amount / note",
        "  t          : Toggle income / expense",
        "  Up/Down    : Choose the envelope for an expense",
        "  Enter      : Save",
        "",
        "Oracle Tab:",
        "  Enter      : Type a question, Enter again to send",
    ]
    .join("\n");

    let p = Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title("Help & Keybindings"));
    f.render_widget(p, area);
}
