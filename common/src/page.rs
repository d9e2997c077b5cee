const PAGE_HEAD: &str = "<!DOCTYPE html><html><head>\
<meta charset='utf-8'>\
<meta name='viewport' content='width=device-width,initial-scale=1'>\
<meta http-equiv='refresh' content='5'>\
<title>Room Temp & Humidity</title>\
<style>body{font-family:Arial,sans-serif;padding:20px;background:#111;color:#eee;} \
.card{max-width:400px;margin:auto;padding:20px;border-radius:12px;background:#222;\
box-shadow:0 0 10px rgba(0,0,0,0.5);} h1{font-size:1.6rem;margin-bottom:0.5rem;} \
.temp{font-size:2.5rem;} .hum{font-size:1.8rem;color:#8fd3ff;}</style>\
</head><body><div class='card'>\
<h1>Room Environment</h1>";

const PAGE_TAIL: &str = "<p>Auto-refreshing every 5 seconds.</p></div></body></html>";

/// Renders the status page. Pure: same inputs, same bytes.
pub fn render_page(
    temperature_c: f32,
    humidity_rh: f32,
    time_of_day: &str,
    zone_label: &str,
) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + PAGE_TAIL.len() + 160);
    html.push_str(PAGE_HEAD);
    html.push_str(&format!("<div class='time'>Time: {time_of_day} {zone_label}</div>"));
    html.push_str("<br>");
    html.push_str(&format!("<div class='temp'>{temperature_c:.2}°C</div>"));
    html.push_str(&format!("<div class='hum'>{humidity_rh:.1}% RH</div>"));
    html.push_str(PAGE_TAIL);
    html
}
