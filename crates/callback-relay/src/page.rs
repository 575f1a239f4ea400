use quick_xml::escape::escape;

pub const DEFAULT_DUO_SCRIPT_URL: &str = "https://api.duosecurity.com/frame/hosted/Duo-Web-v2.min.js";

const APP_NAME: &str = "Credbroker";

/// Parameters of a Duo Web v2 frame, as issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuoFrame {
    /// Shown in the page title, e.g. `Okta (user@example.com)`.
    pub name: String,
    pub host: String,
    pub sig_request: String,
    /// Where the frame posts its completion.
    pub post_action: String,
    pub post_argument: String,
    /// Extra hidden fields posted alongside the completion.
    pub form_args: Vec<(String, String)>,
    pub script_url: String,
}

impl DuoFrame {
    pub fn new(name: &str, host: &str, sig_request: &str, post_action: &str) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            sig_request: sig_request.to_string(),
            post_action: post_action.to_string(),
            post_argument: "sig_response".to_string(),
            form_args: Vec::new(),
            script_url: DEFAULT_DUO_SCRIPT_URL.to_string(),
        }
    }

    pub fn with_form_arg(mut self, name: &str, value: &str) -> Self {
        self.form_args.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_script_url(mut self, script_url: &str) -> Self {
        self.script_url = script_url.to_string();
        self
    }

    /// Render the frame page. `post_action` is where the browser posts the
    /// completion, which is the relay's own route in proxy mode.
    pub(crate) fn render(&self, post_action: &str) -> String {
        let hidden_inputs: String = self
            .form_args
            .iter()
            .map(|(name, value)| {
                format!(
                    "      <input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
                    escape(name.as_str()),
                    escape(value.as_str())
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{app_name}: {name}</title>
    <style>
      body {{ font-family: sans-serif; text-align: center; margin-top: 2em; }}
      #duo_iframe {{ width: 100%; min-width: 304px; max-width: 620px; height: 330px; border: none; }}
    </style>
  </head>
  <body>
    <h2>{name}</h2>
    <iframe id="duo_iframe"
      data-host="{host}"
      data-sig-request="{sig_request}"
      data-post-action="{post_action}"
      data-post-argument="{post_argument}"></iframe>
    <form method="POST" id="duo_form">
{hidden_inputs}    </form>
    <script src="{script_url}"></script>
  </body>
</html>
"#,
            app_name = APP_NAME,
            name = escape(self.name.as_str()),
            host = escape(self.host.as_str()),
            sig_request = escape(self.sig_request.as_str()),
            post_action = escape(post_action),
            post_argument = escape(self.post_argument.as_str()),
            hidden_inputs = hidden_inputs,
            script_url = escape(self.script_url.as_str()),
        )
    }
}
