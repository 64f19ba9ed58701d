//! Dashboard HTML page handler.
//!
//! Serves a self-contained HTML page with inline CSS/JS: the identity gate
//! while nobody is signed in, otherwise the profile card, task and reminder
//! lists and the live transcript overlay.

use crate::routes::AppState;
use crate::view_model::DashboardViewModel;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use buddy_types::{GatePhase, GateStatus, Sender};
use std::sync::Arc;

const MSG_LOADING: &str = "Loading...";

const STYLE: &str = r#"
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f9fafb; color: #111; padding: 16px; }
  .grid { display: grid; grid-template-columns: 1fr 2fr; gap: 16px; min-height: 95vh; }
  .card { background: #fff; border: 1px solid #e5e7eb; border-radius: 12px; padding: 16px; margin-bottom: 16px; }
  .profile { display: flex; align-items: center; gap: 16px; }
  .avatar { width: 48px; height: 48px; border-radius: 50%; background: #c7d2fe; display: flex; align-items: center; justify-content: center; font-weight: bold; }
  .name { font-size: 1.1em; font-weight: 600; }
  .sub { font-size: 0.85em; color: #6b7280; }
  h2 { font-size: 1em; font-weight: 600; margin-bottom: 8px; }
  ul { list-style: disc inside; font-size: 0.9em; color: #374151; }
  li { margin-bottom: 4px; }
  .feed { position: relative; background: #000; border-radius: 12px; height: 70vh; overflow: hidden; }
  .feed .media { color: #9ca3af; font-size: 0.8em; padding: 8px; }
  .overlay { position: absolute; bottom: 8px; right: 8px; background: rgba(255,255,255,0.85); padding: 8px; border-radius: 6px; max-width: 320px; max-height: 12rem; overflow-y: auto; font-size: 0.85em; }
  .user { color: #2563eb; }
  .assistant { color: #16a34a; }
  .meta { color: #6b7280; font-size: 0.8em; margin-top: 8px; }
  .gate { max-width: 420px; margin: 10vh auto; }
  input { width: 100%; padding: 8px; margin-bottom: 8px; border: 1px solid #d1d5db; border-radius: 6px; }
  button { padding: 8px 16px; border: 0; border-radius: 6px; background: #2563eb; color: #fff; cursor: pointer; margin-right: 8px; }
  button.secondary { background: #6b7280; }
  .message { margin-top: 12px; font-size: 0.9em; }
"#;

pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = match state.current_view().await {
        Some(view) => {
            let vm = view.read().await;
            render_dashboard(&vm)
        }
        None if state.config.identity_gate => render_gate(&state.gate.status().await),
        None => render_inactive(),
    };
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn list_items(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("<li>{}</li>", empty);
    }
    items
        .iter()
        .map(|item| format!("<li>{}</li>\n", escape_html(item)))
        .collect()
}

fn sender_class(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "user",
        Sender::Assistant => "assistant",
    }
}

pub fn render_dashboard(vm: &DashboardViewModel) -> String {
    let raw_name = vm.display_name();
    let name = escape_html(raw_name);
    let initial = raw_name
        .chars()
        .next()
        .map(|c| escape_html(&c.to_uppercase().to_string()))
        .unwrap_or_default();

    // Placeholders only mean "none found" once the loader is done
    let (task_items, reminder_items) = if vm.loaded {
        (
            list_items(&vm.data.tasks, "No tasks found"),
            list_items(&vm.data.reminders, "No reminders found"),
        )
    } else {
        let loading = format!("<li>{}</li>", MSG_LOADING);
        (loading.clone(), loading)
    };

    let mut transcript_html = String::new();
    for line in vm.transcript.lines() {
        transcript_html.push_str(&format!(
            "<div class=\"{}\"><strong>{}</strong> {}</div>\n",
            sender_class(line.sender),
            line.sender.label(),
            escape_html(&line.text)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>AI Buddy Dashboard</title>
<style>{style}</style>
</head>
<body>
<div class="grid">
  <div>
    <div class="card profile">
      <div class="avatar" id="avatar">{initial}</div>
      <div>
        <p class="name" id="name">{name}</p>
        <p class="sub">AI Buddy User</p>
      </div>
    </div>
    <div class="card">
      <h2>Upcoming Tasks</h2>
      <ul id="tasks">{task_items}</ul>
    </div>
    <div class="card">
      <h2>Reminders</h2>
      <ul id="reminders">{reminder_items}</ul>
    </div>
    <button class="secondary" onclick="closeSession()">Log out</button>
  </div>
  <div class="card">
    <h2>Talk to your AI Buddy</h2>
    <div class="feed">
      <p class="media" id="media">Media: {media} &middot; Channel: {channel}</p>
      <div class="overlay" id="transcript">{transcript_html}</div>
    </div>
  </div>
</div>
<script>
  let cursor = {cursor};
  let loaded = {loaded};
  const labels = {{ user: "You:", assistant: "AI:" }};
  function fillList(id, items, empty) {{
    const ul = document.getElementById(id);
    ul.replaceChildren();
    for (const text of (items.length ? items : [empty])) {{
      const li = document.createElement("li");
      li.textContent = text;
      ul.appendChild(li);
    }}
  }}
  async function refresh() {{
    try {{
      const res = await fetch("/rpc/dashboard");
      const body = await res.json();
      if (!body.success) return;
      const data = body.data;
      document.getElementById("media").textContent =
        "Media: " + data.media + " \u00b7 Channel: " + data.channel;
      if (data.loaded && !loaded) {{
        loaded = true;
        document.getElementById("name").textContent = data.name;
        document.getElementById("avatar").textContent = data.name.charAt(0).toUpperCase();
        fillList("tasks", data.tasks, "No tasks found");
        fillList("reminders", data.reminders, "No reminders found");
      }}
    }} catch (e) {{
      console.error("dashboard refresh failed", e);
    }}
  }}
  async function poll() {{
    try {{
      const res = await fetch("/rpc/transcript?since=" + cursor);
      const body = await res.json();
      if (body.success) {{
        const box = document.getElementById("transcript");
        for (const line of body.data.lines) {{
          const div = document.createElement("div");
          div.className = line.sender;
          const strong = document.createElement("strong");
          strong.textContent = labels[line.sender] || "AI:";
          div.appendChild(strong);
          div.appendChild(document.createTextNode(" " + line.text));
          box.appendChild(div);
        }}
        cursor = body.data.next;
        box.scrollTop = box.scrollHeight;
      }}
    }} catch (e) {{
      console.error("transcript poll failed", e);
    }}
  }}
  async function closeSession() {{
    await fetch("/rpc/session/close", {{ method: "POST" }});
    location.reload();
  }}
  setInterval(poll, 1000);
  setInterval(refresh, 1000);
</script>
</body>
</html>"#,
        style = STYLE,
        initial = initial,
        name = name,
        task_items = task_items,
        reminder_items = reminder_items,
        media = escape_html(&vm.media.label()),
        channel = escape_html(&vm.channel.label()),
        transcript_html = transcript_html,
        cursor = vm.transcript.len(),
        loaded = vm.loaded,
    )
}

pub fn render_gate(status: &GateStatus) -> String {
    let message = status
        .message
        .as_deref()
        .map(escape_html)
        .unwrap_or_default();
    let busy = if matches!(status.phase, GatePhase::Capturing | GatePhase::Submitting) {
        " disabled"
    } else {
        ""
    };
    let actions = if status.camera_denied {
        String::new()
    } else {
        format!(
            r#"<button onclick="login()"{busy}>Login</button>
  <button class="secondary" onclick="register()"{busy}>Register</button>"#,
            busy = busy
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>AI Buddy Login</title>
<style>{style}</style>
</head>
<body>
<div class="card gate">
  <h2>Face Login</h2>
  <input id="username" placeholder="Username (register only)">
  <input id="name" placeholder="Name (register only)">
  {actions}
  <p class="message" id="message">{message}</p>
</div>
<script>
  async function submit(path, body) {{
    const opts = {{ method: "POST" }};
    if (body) {{
      opts.headers = {{ "Content-Type": "application/json" }};
      opts.body = JSON.stringify(body);
    }}
    try {{
      const res = await fetch(path, opts);
      const data = await res.json();
      if (res.status === 503 || (data.success && data.data.phase === "granted")) {{
        location.reload();
        return;
      }}
      document.getElementById("message").textContent =
        data.success ? (data.data.message || "") : data.error;
    }} catch (e) {{
      document.getElementById("message").textContent = "❌ " + e;
    }}
  }}
  function login() {{ submit("/rpc/gate/verify"); }}
  function register() {{
    submit("/rpc/gate/register", {{
      username: document.getElementById("username").value,
      name: document.getElementById("name").value,
    }});
  }}
</script>
</body>
</html>"#,
        style = STYLE,
        actions = actions,
        message = message,
    )
}

fn render_inactive() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AI Buddy Dashboard</title>
<style>{style}</style>
</head>
<body>
<div class="card gate">
  <h2>No active session</h2>
  <p class="sub">Restart the dashboard host to open a new session.</p>
</div>
</body>
</html>"#,
        style = STYLE,
    )
}
