//! Reply texts shipped with the binary for the template ids the
//! orchestrator and the default route rely on. A configured template of
//! the same id takes precedence.

use pelangi_common::Language;

pub const FALLBACK: &str = "fallback";
pub const PLEASE_HOLD: &str = "please_hold";
pub const WORKFLOW_CANCELLED: &str = "workflow_cancelled";
pub const WORKFLOW_FAILED: &str = "workflow_failed";
pub const ESCALATION_UNKNOWN: &str = "escalation_unknown";

struct Builtin {
    id: &'static str,
    en: &'static str,
    ms: &'static str,
    zh: &'static str,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        id: FALLBACK,
        en: "Sorry, I can't answer that right now. Our staff will follow up with you.",
        ms: "Maaf, saya tidak dapat menjawab sekarang. Staf kami akan menghubungi anda.",
        zh: "抱歉，暂时无法回答，工作人员会跟进。",
    },
    Builtin {
        id: PLEASE_HOLD,
        en: "Thanks for your patience, please hold on a moment.",
        ms: "Terima kasih kerana bersabar, sila tunggu sebentar.",
        zh: "感谢耐心等待，请稍候。",
    },
    Builtin {
        id: WORKFLOW_CANCELLED,
        en: "No problem, I've cancelled that. Anything else I can help with?",
        ms: "Baik, saya telah batalkan. Ada apa-apa lagi?",
        zh: "好的，已取消。还有什么可以帮您？",
    },
    Builtin {
        id: WORKFLOW_FAILED,
        en: "Sorry, something went wrong. Our staff will continue from here.",
        ms: "Maaf, berlaku masalah. Staf kami akan membantu seterusnya.",
        zh: "抱歉出了点问题，工作人员会继续为您处理。",
    },
    Builtin {
        id: ESCALATION_UNKNOWN,
        en: "I'm not sure I understood. Let me get someone from our team to help you.",
        ms: "Maaf, saya kurang faham. Saya akan minta staf kami membantu anda.",
        zh: "抱歉我没太明白，我会请工作人员协助您。",
    },
];

/// Built-in text for `id` in `language`. Built-ins carry no placeholders.
#[must_use]
pub fn builtin_text(id: &str, language: Language) -> Option<&'static str> {
    BUILTINS.iter().find(|b| b.id == id).map(|b| match language {
        Language::En => b.en,
        Language::Ms => b.ms,
        Language::Zh => b.zh,
    })
}

#[must_use]
pub fn is_builtin(id: &str) -> bool {
    BUILTINS.iter().any(|b| b.id == id)
}
