//! Fixed reply texts. Everything is HTML; user-supplied values go through `escape`.

use chrono::{DateTime, Utc};
use teloxide::utils::html::escape;
use vipgate_db::models::{PaymentReport, ReportSubmission};

use crate::bot::commands::AdminVerb;
use crate::config::Membership;

/// Keeps `/list_pending` under Telegram's message size limit.
pub const MAX_PENDING_LISTED: usize = 40;

pub fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn help(bot_name: &str) -> String {
    format!(
        "👋 <b>{}</b>\n\n\
         Este bot gestiona el acceso VIP (pago manual en cripto).\n\n\
         Comandos:\n\
         /vip - Ver precio y método de pago\n\
         /pago - Reportar pago (tx hash)\n\
         /status - Ver estado de tu suscripción",
        escape(bot_name)
    )
}

pub fn plan(membership: &Membership, days: i64) -> String {
    format!(
        "💎 <b>Membresía VIP</b>\n\n\
         Precio: <b>{price} {currency}</b> / {days} días\n\
         Red: <b>{network}</b>\n\
         Dirección: <code>{address}</code>\n\n\
         Pasos:\n\
         1) Envía el pago a la dirección indicada.\n\
         2) Usa /pago y responde con: <code>tx_hash;amount;network;nota</code>\n\
         3) Un admin revisará tu pago. Al aprobarlo recibirás el enlace VIP.",
        price = escape(&membership.price),
        currency = escape(&membership.currency),
        days = days,
        network = escape(&membership.network),
        address = escape(&membership.address),
    )
}

pub fn report_format() -> String {
    "🔔 <b>Registrar pago</b>\n\n\
     Responde con un mensaje de texto:\n\
     <code>tx_hash;amount;network;nota opcional</code>\n\n\
     Ejemplo:\n\
     <code>0xabc123...;10;BSC;Pago mensual</code>"
        .to_string()
}

pub fn report_received(report_id: i64) -> String {
    format!(
        "✅ Pago registrado (ID: {}). Espera la validación de un admin.",
        report_id
    )
}

pub fn invalid_report(reason: &str) -> String {
    format!(
        "Formato inválido ({}). Usa: <code>tx_hash;amount;network;nota (opc)</code>",
        escape(reason)
    )
}

pub fn admin_new_report(
    report_id: i64,
    user_id: i64,
    display_name: Option<&str>,
    report: &ReportSubmission,
) -> String {
    format!(
        "💰 <b>Nuevo pago pendiente</b>\n\
         ID: {id}\n\
         Usuario: {user_id} ({name})\n\
         Tx: <code>{tx}</code>\n\
         Monto: {amount} {network}\n\
         Nota: {note}\n\n\
         /aprobar_{id} · /rechazar_{id} · /list_pending",
        id = report_id,
        user_id = user_id,
        name = escape(display_name.unwrap_or("-")),
        tx = escape(report.tx_hash()),
        amount = escape(report.amount()),
        network = escape(report.network()),
        note = escape(report.note().unwrap_or("-")),
    )
}

pub fn status_active(expiry: DateTime<Utc>) -> String {
    format!("✅ Activo hasta: <b>{}</b>", format_instant(expiry))
}

pub fn status_inactive() -> String {
    "❌ No tienes suscripción activa.".to_string()
}

pub fn status_unknown() -> String {
    "No hay registro para tu usuario.".to_string()
}

pub fn no_pending() -> String {
    "No hay pagos pendientes.".to_string()
}

pub fn pending_list(reports: &[PaymentReport]) -> String {
    let mut text = format!("🔎 <b>Pagos pendientes</b> ({})\n", reports.len());
    for report in reports.iter().take(MAX_PENDING_LISTED) {
        text.push_str(&format!(
            "#{} user:{} tx:<code>{}</code> amt:{} net:{} at:{}\n",
            report.id,
            report.user_id,
            escape(&report.tx_hash),
            escape(&report.amount),
            escape(&report.network),
            format_instant(report.created_at),
        ));
    }
    if reports.len() > MAX_PENDING_LISTED {
        text.push_str(&format!("… y {} más", reports.len() - MAX_PENDING_LISTED));
    }
    text
}

pub fn invite_for_user(link: &str, days: i64, expiry: DateTime<Utc>) -> String {
    format!(
        "🎉 Pago aprobado. Enlace VIP (válido {} días, un solo uso):\n{}\n\nExpira: {}",
        days,
        escape(link),
        format_instant(expiry)
    )
}

pub enum InviteDelivery {
    Sent,
    /// Link exists but the user could not be messaged.
    Undelivered(String),
    LinkFailed,
}

pub fn approved(report_id: i64, user_id: i64, expiry: DateTime<Utc>, invite: &InviteDelivery) -> String {
    let mut text = format!(
        "Pago {} aprobado. Usuario {} activado hasta {}.",
        report_id,
        user_id,
        format_instant(expiry)
    );
    match invite {
        InviteDelivery::Sent => {}
        InviteDelivery::Undelivered(link) => text.push_str(&format!(
            "\n⚠️ No se pudo enviar el enlace al usuario. Reenvíalo manualmente: {}",
            escape(link)
        )),
        InviteDelivery::LinkFailed => {
            text.push_str("\n⚠️ No se pudo crear el enlace de invitación al canal VIP.")
        }
    }
    text
}

pub fn rejected(report_id: i64) -> String {
    format!("Pago {} rechazado.", report_id)
}

pub fn rejected_for_user(report_id: i64) -> String {
    format!(
        "❌ Tu pago (id {}) fue rechazado. Contacta al admin.",
        report_id
    )
}

pub fn report_not_found() -> String {
    "Pago no encontrado.".to_string()
}

pub fn deactivated(user_id: i64) -> String {
    format!("Usuario {} desactivado.", user_id)
}

pub fn user_not_found() -> String {
    "Usuario no encontrado.".to_string()
}

pub fn malformed_admin(verb: AdminVerb) -> String {
    format!("Formato inválido. Usa {}", verb.usage())
}

pub fn generic_failure() -> String {
    "⚠️ Error interno. Inténtalo de nuevo más tarde.".to_string()
}
