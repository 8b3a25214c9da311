//! Default configuration template with the options documented.
//!
//! Written by `pelangi init` and used as the built-in configuration when no
//! config file is found. It ships the check-in workflow, keyword and example
//! corpora for English, Malay and Chinese, and a routing table covering every
//! intent it can classify.

pub const DEFAULT_CONFIG_TEMPLATE: &str = r##"# Pelangi guest-message configuration
# ===================================
# Environment variable substitution is supported: ${ENV_VAR} or ${ENV_VAR:-default}
# Example: api_key = "${GROQ_API_KEY}"
#
# Changes are picked up automatically while `pelangi chat` is running; a
# config that fails validation is rejected and the previous one stays live.

# ══════════════════════════════════════════════════════════════════════════════
# SYSTEM
# ══════════════════════════════════════════════════════════════════════════════
# Available in templates as {{system.<name>}}; {{system.date}} and
# {{system.time}} are computed in the timezone below.

[system]
hostel_name = "Pelangi Capsule Hostel"
timezone = "Asia/Kuala_Lumpur"

[system.constants]
wifi_name = "Pelangi_Guest"
wifi_password = "${PELANGI_WIFI_PASSWORD:-pelangi2024}"
check_in_time = "3:00 PM"
check_out_time = "12:00 PM"
address = "Jalan Pelangi, Johor Bahru"

# ══════════════════════════════════════════════════════════════════════════════
# CLASSIFIER
# ══════════════════════════════════════════════════════════════════════════════
# Tiers run cheapest first: emergency regex, fuzzy keywords, semantic
# examples, then the LLM. Each stops the pipeline once its threshold is met.

[classifier.emergency]
enabled = true
# Built-in patterns cover fire, theft, medical emergencies and lockouts.
# Listing [[classifier.emergency.patterns]] here replaces them.

[classifier.fuzzy]
enabled = true
threshold = 0.80

[classifier.fuzzy.keywords.greeting_hello]
en = ["hi", "hello", "hey", "good morning", "good evening"]
ms = ["hai", "helo", "selamat pagi", "selamat petang"]
zh = ["你好", "您好", "早上好"]

[classifier.fuzzy.keywords.thanks]
en = ["thanks", "thank you", "tq", "thx", "ty", "much appreciated"]
ms = ["terima kasih", "tqvm"]
zh = ["谢谢", "多谢", "感谢"]

[classifier.fuzzy.keywords.check_in_arrival]
en = ["check in", "checkin", "i have arrived", "just arrived"]
ms = ["daftar masuk", "sudah sampai", "dah sampai"]
zh = ["入住", "办理入住", "我到了"]

[classifier.fuzzy.keywords.checkout_procedure]
en = ["check out", "checkout", "checkout time"]
ms = ["daftar keluar", "waktu keluar"]
zh = ["退房", "退房时间"]

[classifier.fuzzy.keywords.late_checkout_request]
en = ["late checkout", "late check out", "extend checkout"]
ms = ["lewat keluar", "keluar lewat"]
zh = ["延迟退房", "晚点退房"]

[classifier.fuzzy.keywords.wifi_password]
en = ["wifi", "wifi password", "wi fi", "internet password"]
ms = ["kata laluan wifi"]
zh = ["无线网", "wifi密码"]

[classifier.fuzzy.keywords.pricing_inquiry]
en = ["how much", "price", "room rate", "per night"]
ms = ["berapa harga", "harga"]
zh = ["多少钱", "价格"]

[classifier.fuzzy.keywords.directions_location]
en = ["address", "location", "directions", "how to get there"]
ms = ["alamat", "lokasi"]
zh = ["地址", "怎么去", "位置"]

[classifier.fuzzy.keywords.complaint]
en = ["complaint", "not happy", "dirty", "bad service"]
ms = ["aduan", "kotor"]
zh = ["投诉", "很脏"]

[classifier.fuzzy.keywords.noise_complaint]
en = ["noisy", "too loud", "noise"]
ms = ["bising"]
zh = ["太吵", "噪音"]

[classifier.semantic]
enabled = true
threshold = 0.75
fuzzy_skip_cutoff = 0.85

[classifier.semantic.examples]
check_in_arrival = [
  "I am at the front door now",
  "what do I need to do to get my capsule",
  "saya sudah tiba di hostel",
]
facilities_info = [
  "do you have lockers",
  "is there a kitchen I can use",
  "can I do laundry here",
  "is breakfast included",
]
lost_item = [
  "I left my charger in the room",
  "I lost my wallet",
  "did anyone find my phone",
]
post_checkout_complaint = [
  "after I checked out I found a charge on my card",
  "the room was dirty during my stay last week",
]
pricing_inquiry = [
  "what is the rate for two nights",
  "do you have a weekly price",
]

[classifier.generative]
enabled = true
threshold = 0.5
max_history = 6

[classifier.generative.aliases]
greeting = "greeting_hello"
gratitude = "thanks"
check_in = "check_in_arrival"
checkout = "checkout_procedure"
price = "pricing_inquiry"
wifi = "wifi_password"
directions = "directions_location"
facilities = "facilities_info"

# ══════════════════════════════════════════════════════════════════════════════
# PROVIDERS
# ══════════════════════════════════════════════════════════════════════════════
# OpenAI-compatible chat endpoints, tried in order. A provider that fails
# three times in a row is skipped for a minute.

# [[providers.chain]]
# id = "groq"
# base_url = "https://api.groq.com/openai/v1"
# api_key = "${GROQ_API_KEY}"
# model = "llama-3.1-8b-instant"
# timeout_secs = 8
#
# [[providers.chain]]
# id = "openrouter"
# base_url = "https://openrouter.ai/api/v1"
# api_key = "${OPENROUTER_API_KEY}"
# model = "meta-llama/llama-3.1-8b-instruct"

[providers.embeddings]
local_fallback = true             # Offline trigram embedder as the last resort
dimensions = 256

# ══════════════════════════════════════════════════════════════════════════════
# ROUTING
# ══════════════════════════════════════════════════════════════════════════════
# action = static_reply | generated_reply | start_workflow | escalate
# Emergency intents and `always_escalate` escalate whatever the table says.

[routing]
always_escalate = ["noise_complaint_infant"]
generated_reply_fallback = "fallback"

[routing.default]
action = "escalate"
reply_template = "escalation_unknown"

[routing.intents.greeting_hello]
action = "static_reply"
template = "greeting"

[routing.intents.thanks]
action = "static_reply"
template = "thanks"

[routing.intents.check_in_arrival]
action = "start_workflow"
workflow = "check_in"

[routing.intents.checkout_procedure]
action = "static_reply"
template = "checkout_info"

[routing.intents.late_checkout_request]
action = "start_workflow"
workflow = "late_checkout"

[routing.intents.wifi_password]
action = "static_reply"
template = "wifi"

[routing.intents.pricing_inquiry]
action = "generated_reply"
instructions = "Quote capsule rates only if the guest names dates; otherwise ask for them."

[routing.intents.directions_location]
action = "static_reply"
template = "directions"

[routing.intents.facilities_info]
action = "generated_reply"

[routing.intents.complaint]
action = "escalate"
reply_template = "complaint_received"

[routing.intents.post_checkout_complaint]
action = "escalate"
reply_template = "complaint_received"

[routing.intents.noise_complaint]
action = "static_reply"
template = "noise_reply"

[routing.intents.noise_complaint_infant]
action = "escalate"
reply_template = "infant_policy"

[routing.intents.lost_item]
action = "escalate"
reply_template = "lost_item"

[routing.intents.fire_emergency]
action = "escalate"
reply_template = "emergency_ack"

[routing.intents.theft_report]
action = "escalate"
reply_template = "emergency_ack"

[routing.intents.medical_emergency]
action = "escalate"
reply_template = "emergency_ack"

[routing.intents.lockout]
action = "escalate"
reply_template = "lockout_ack"

# ══════════════════════════════════════════════════════════════════════════════
# TEMPLATES
# ══════════════════════════════════════════════════════════════════════════════
# Placeholders: {{variable}}, {{guest.field}}, {{system.field}}; append `?`
# ({{guest.name?}}) to render an empty string when the value is missing.

[templates]
greeting = { en = "Hi! Welcome to {{system.hostel_name}}. How can I help you today?", ms = "Hai! Selamat datang ke {{system.hostel_name}}. Ada apa yang boleh saya bantu?", zh = "你好！欢迎来到{{system.hostel_name}}。有什么可以帮您？" }
thanks = { en = "You're welcome! Let us know if you need anything else.", ms = "Sama-sama! Beritahu kami jika perlukan apa-apa lagi.", zh = "不客气！如有其他需要请告诉我们。" }
checkout_info = { en = "Check-out is at {{system.check_out_time}}. Please return your access card at the front desk.", ms = "Waktu daftar keluar ialah {{system.check_out_time}}. Sila pulangkan kad akses di kaunter.", zh = "退房时间是{{system.check_out_time}}。请将门卡交还前台。" }
wifi = { en = "WiFi: {{system.wifi_name}} / password: {{system.wifi_password}}", ms = "WiFi: {{system.wifi_name}} / kata laluan: {{system.wifi_password}}", zh = "WiFi：{{system.wifi_name}} / 密码：{{system.wifi_password}}" }
directions = { en = "We're at {{system.address}}. Check-in starts at {{system.check_in_time}}.", ms = "Alamat kami: {{system.address}}. Daftar masuk bermula {{system.check_in_time}}.", zh = "我们的地址：{{system.address}}。入住时间从{{system.check_in_time}}开始。" }
noise_reply = { en = "Sorry about the noise! We'll remind guests about quiet hours right away.", ms = "Maaf atas gangguan bunyi! Kami akan ingatkan tetamu tentang waktu senyap.", zh = "抱歉打扰了！我们会马上提醒其他客人保持安静。" }
complaint_received = { en = "I'm sorry to hear that. I've passed this to our staff and someone will contact you shortly.", ms = "Maaf atas kesulitan ini. Kami telah maklumkan kepada staf dan mereka akan hubungi anda.", zh = "很抱歉给您带来不便。我们已通知工作人员，稍后会联系您。" }
infant_policy = { en = "Thank you for letting us know. Our staff will attend to this immediately.", ms = "Terima kasih kerana memaklumkan. Staf kami akan segera menguruskannya.", zh = "感谢告知，工作人员会立即处理。" }
lost_item = { en = "Sorry to hear that! Our staff will check and get back to you.", ms = "Maaf mendengarnya! Staf kami akan semak dan hubungi anda.", zh = "很遗憾！工作人员会帮您查找并回复。" }
emergency_ack = { en = "We've alerted our staff right now. If anyone is in danger please call 999.", ms = "Staf kami telah dimaklumkan sekarang. Jika ada bahaya sila hubungi 999.", zh = "已立即通知工作人员。如有危险请拨打999。" }
lockout_ack = { en = "No worries, our staff have been notified and will help you get back in.", ms = "Jangan risau, staf kami telah dimaklumkan dan akan membantu anda.", zh = "别担心，已通知工作人员来帮您。" }
escalation_unknown = { en = "I'm not sure I understood. Let me get someone from our team to help you.", ms = "Maaf, saya kurang faham. Saya akan minta staf kami membantu anda.", zh = "抱歉我没太明白，我会请工作人员协助您。" }
fallback = { en = "Sorry, I can't answer that right now. Our staff will follow up with you.", ms = "Maaf, saya tidak dapat menjawab sekarang. Staf kami akan menghubungi anda.", zh = "抱歉，暂时无法回答，工作人员会跟进。" }
please_hold = { en = "Thanks for your patience, please hold on a moment.", ms = "Terima kasih kerana bersabar, sila tunggu sebentar.", zh = "感谢耐心等待，请稍候。" }
workflow_cancelled = { en = "No problem, I've cancelled that. Anything else I can help with?", ms = "Baik, saya telah batalkan. Ada apa-apa lagi?", zh = "好的，已取消。还有什么可以帮您？" }
workflow_failed = { en = "Sorry, something went wrong. Our staff will continue from here.", ms = "Maaf, berlaku masalah. Staf kami akan membantu seterusnya.", zh = "抱歉出了点问题，工作人员会继续为您处理。" }

# ══════════════════════════════════════════════════════════════════════════════
# STAFF & EXTERNAL ACTIONS
# ══════════════════════════════════════════════════════════════════════════════

[staff]
default_recipient = "front_desk"

[staff.recipients]
front_desk = "${PELANGI_FRONT_DESK:-front_desk}"

[actions]
endpoint = "${PELANGI_MCP_URL:-http://localhost:3001/mcp}"
tool_prefix = "pelangi_"
timeout_secs = 10

# ══════════════════════════════════════════════════════════════════════════════
# RUNTIME
# ══════════════════════════════════════════════════════════════════════════════

[orchestrator]
budget_secs = 20                  # Wall-clock budget per inbound message
history_len = 10
dedup_window = 50
max_workflow_steps = 50           # Node visits per start/resume before escalating
cancel_words = ["cancel", "stop", "batal", "取消"]

[sessions]
backend = "memory"                # "memory" or "sqlite"
# path = "/var/lib/pelangi/sessions.db"

[metrics]
enabled = false

# ══════════════════════════════════════════════════════════════════════════════
# WORKFLOWS
# ══════════════════════════════════════════════════════════════════════════════
# Graph format: start_node_id + nodes. Flat `steps` lists are accepted for
# flows without branching. More definitions can live in `workflows_dir`.

[[workflows]]
id = "check_in"
version = 1
name = "Guest check-in"
start_node_id = "welcome"

[workflows.nodes.welcome]
kind = "message"
template = { en = "Welcome to {{system.hostel_name}}! Let's get you checked in.", ms = "Selamat datang ke {{system.hostel_name}}! Mari daftar masuk.", zh = "欢迎来到{{system.hostel_name}}！我们来办理入住。" }
next = "ask_name"

[workflows.nodes.ask_name]
kind = "wait_for_reply"
prompt = { en = "May I have your full name?", ms = "Boleh saya dapatkan nama penuh anda?", zh = "请问您的全名是？" }
variable = "guest_name"
next = "ask_phone"

[workflows.nodes.ask_phone]
kind = "wait_for_reply"
prompt = { en = "Thanks {{guest_name}}! What's your phone number?", ms = "Terima kasih {{guest_name}}! Apakah nombor telefon anda?", zh = "谢谢{{guest_name}}！请问您的电话号码？" }
variable = "phone"
next = "check_availability"

[workflows.nodes.check_availability]
kind = "external_call"
action = "check_availability"
params = { date = "{{system.date}}" }
on_success = "has_units"
on_error = "create_link"

[workflows.nodes.has_units]
kind = "condition"
field = "available_units"
operator = ">"
value = 0
if_true = "create_link"
if_false = "notify_full"

[workflows.nodes.notify_full]
kind = "outbound_notify"
recipient = "front_desk"
template = "No capsules free on {{system.date}} for {{guest_name}} ({{phone}}); please arrange one."
next = "create_link"

[workflows.nodes.create_link]
kind = "external_call"
action = "create_checkin_link"
params = { name = "{{guest_name}}", phone = "{{phone}}" }
on_success = "send_link"
on_error = "link_failed"

[workflows.nodes.send_link]
kind = "message"
template = { en = "Please complete your check-in here: {{checkin_link}}", ms = "Sila lengkapkan daftar masuk di sini: {{checkin_link}}", zh = "请在此完成入住登记：{{checkin_link}}" }
next = "notify_staff"

[workflows.nodes.notify_staff]
kind = "outbound_notify"
recipient = "front_desk"
template = "Check-in link sent to {{guest_name}} ({{phone}})."

[workflows.nodes.link_failed]
kind = "message"
template = { en = "Thanks {{guest_name}}! Our staff will send your check-in link shortly.", ms = "Terima kasih {{guest_name}}! Staf kami akan hantar pautan daftar masuk sebentar lagi.", zh = "谢谢{{guest_name}}！工作人员稍后会发送入住链接。" }
next = "notify_link_failed"

[workflows.nodes.notify_link_failed]
kind = "outbound_notify"
recipient = "front_desk"
template = "Could not create a check-in link for {{guest_name}} ({{phone}}); please send one manually."

[[workflows]]
id = "late_checkout"
version = 1
name = "Late checkout request"

[[workflows.steps]]
kind = "wait_for_reply"
prompt = { en = "What time would you like to check out?", ms = "Pukul berapa anda mahu daftar keluar?", zh = "您想几点退房？" }
variable = "requested_time"

[[workflows.steps]]
kind = "external_call"
action = "request_late_checkout"
params = { time = "{{requested_time}}", guest = "{{guest.key}}" }

[[workflows.steps]]
kind = "message"
template = { en = "Noted! We'll confirm your late checkout at {{requested_time}} shortly.", ms = "Baik! Kami akan sahkan daftar keluar lewat pada {{requested_time}}.", zh = "好的！我们会尽快确认您{{requested_time}}的延迟退房。" }

[[workflows.steps]]
kind = "outbound_notify"
recipient = "front_desk"
template = "Late checkout requested for {{requested_time}} by {{guest.key}}."
"##;
