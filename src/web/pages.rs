//! HTML pages served from the callback endpoint. Presentation only.

pub fn success_page(username: &str, guild_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verification Successful</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #11998e 0%, #38ef7d 100%);
        }}
        .container {{
            background: white;
            padding: 40px;
            border-radius: 16px;
            box-shadow: 0 10px 40px rgba(0,0,0,0.2);
            text-align: center;
            max-width: 400px;
        }}
        h1 {{
            color: #11998e;
            margin-bottom: 10px;
        }}
        .success-icon {{
            font-size: 60px;
            margin-bottom: 20px;
        }}
        .username {{
            font-size: 1.3em;
            color: #2c3e50;
            font-weight: bold;
            margin: 15px 0;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="success-icon">✓</div>
        <h1>Verification Successful!</h1>
        <div class="username">{username}</div>
        <p>Your account has been verified. You now have full access to <strong>{guild_name}</strong>.</p>
        <p style="color: #888; font-size: 14px;">You can close this window and head back to Discord.</p>
    </div>
</body>
</html>"#
    )
}

pub fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verification Failed</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #f093fb 0%, #f5576c 100%);
        }}
        .container {{
            background: white;
            padding: 40px;
            border-radius: 16px;
            box-shadow: 0 10px 40px rgba(0,0,0,0.2);
            text-align: center;
            max-width: 400px;
        }}
        h1 {{
            color: #f5576c;
        }}
        .error-icon {{
            font-size: 60px;
            margin-bottom: 20px;
        }}
        .message {{
            background: #fff5f5;
            padding: 15px;
            border-radius: 8px;
            color: #c53030;
            margin: 20px 0;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="error-icon">✕</div>
        <h1>Verification Failed</h1>
        <div class="message">{message}</div>
        <p style="color: #888; font-size: 14px;">Please try again or contact an administrator.</p>
    </div>
</body>
</html>"#
    )
}
