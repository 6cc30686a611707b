//! Documentation pages served next to the API document

const API_JSON_PLACEHOLDER: &str = "{api_json}";

const SWAGGER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <meta name="description" content="SwaggerUI" />
    <title>SwaggerUI</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@4.5.0/swagger-ui.css" />
  </head>
  <body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@4.5.0/swagger-ui-bundle.js" crossorigin></script>
  <script src="https://unpkg.com/swagger-ui-dist@4.5.0/swagger-ui-standalone-preset.js" crossorigin></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({
        url: '{api_json}',
        dom_id: '#swagger-ui',
        presets: [
          SwaggerUIBundle.presets.apis,
          SwaggerUIStandalonePreset
        ],
        layout: "StandaloneLayout",
      });
    };
  </script>
  </body>
</html>
"#;

const REDOC_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>API Document</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link href="https://fonts.googleapis.com/css?family=Montserrat:300,400,700|Roboto:300,400,700" rel="stylesheet">
    <style>
      body {
        margin: 0;
        padding: 0;
      }
    </style>
  </head>
  <body>
    <redoc spec-url='{api_json}'></redoc>
    <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"> </script>
  </body>
</html>
"#;

/// Path of the API document under `prefix`
pub fn api_json_path(prefix: &str) -> String {
    format!("{}api.json", prefix)
}

/// Path of the ReDoc page under `prefix`
pub fn redoc_path(prefix: &str) -> String {
    format!("{}doc", prefix)
}

/// Swagger UI page loading the document under `prefix`
pub fn swagger_page(prefix: &str) -> String {
    SWAGGER_TEMPLATE.replace(API_JSON_PLACEHOLDER, &api_json_path(prefix))
}

/// ReDoc page loading the document under `prefix`
pub fn redoc_page(prefix: &str) -> String {
    REDOC_TEMPLATE.replace(API_JSON_PLACEHOLDER, &api_json_path(prefix))
}
